use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalId(pub i64);

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Estimate,
    Contract,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Estimate => "ESTIMATE",
            Self::Contract => "CONTRACT",
        }
    }
}

impl FromStr for DocumentType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ESTIMATE" => Ok(Self::Estimate),
            "CONTRACT" => Ok(Self::Contract),
            other => Err(DomainError::InvalidValue { field: "doc_type", value: other.to_string() }),
        }
    }
}

/// The business document an approval request is about. Exactly one of
/// estimate or contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentRef {
    Estimate(i64),
    Contract(i64),
}

impl DocumentRef {
    pub fn new(doc_type: DocumentType, doc_id: i64) -> Self {
        match doc_type {
            DocumentType::Estimate => Self::Estimate(doc_id),
            DocumentType::Contract => Self::Contract(doc_id),
        }
    }

    pub fn doc_type(&self) -> DocumentType {
        match self {
            Self::Estimate(_) => DocumentType::Estimate,
            Self::Contract(_) => DocumentType::Contract,
        }
    }

    pub fn doc_id(&self) -> i64 {
        match self {
            Self::Estimate(id) | Self::Contract(id) => *id,
        }
    }

    /// Builds a reference from the loose request fields. Explicit
    /// `estimate_id`/`contract_id` take priority over `doc_type`+`doc_id`;
    /// naming both an estimate and a contract is rejected.
    pub fn resolve(
        doc_type: Option<&str>,
        doc_id: Option<i64>,
        estimate_id: Option<i64>,
        contract_id: Option<i64>,
    ) -> Result<Self, DomainError> {
        let reference = match (estimate_id, contract_id) {
            (Some(_), Some(_)) => {
                return Err(DomainError::InvalidDocumentReference(
                    "only one of estimate_id or contract_id may be provided".to_string(),
                ))
            }
            (Some(estimate_id), None) => Self::Estimate(estimate_id),
            (None, Some(contract_id)) => Self::Contract(contract_id),
            (None, None) => match (doc_type, doc_id) {
                (Some(doc_type), Some(doc_id)) => Self::new(doc_type.parse()?, doc_id),
                _ => {
                    return Err(DomainError::InvalidDocumentReference(
                        "either estimate_id or contract_id must be provided".to_string(),
                    ))
                }
            },
        };

        if reference.doc_id() <= 0 {
            return Err(DomainError::InvalidDocumentReference(format!(
                "document id must be positive, got {}",
                reference.doc_id()
            )));
        }

        Ok(reference)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Draft,
    Requesting,
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Requesting => "REQUESTING",
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Approved, rejected and cancelled requests accept no further line actions.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "DRAFT" | "draft" | "임시저장" => Ok(Self::Draft),
            "REQUESTING" | "requesting" | "승인요청" => Ok(Self::Requesting),
            "PENDING" | "pending" | "승인대기" => Ok(Self::Pending),
            "APPROVED" | "approved" | "승인" => Ok(Self::Approved),
            "REJECTED" | "rejected" | "반려" => Ok(Self::Rejected),
            "CANCELLED" | "cancelled" | "취소" => Ok(Self::Cancelled),
            other => Err(DomainError::InvalidValue { field: "status", value: other.to_string() }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for LineStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "CANCELLED" => Ok(Self::Cancelled),
            other => {
                Err(DomainError::InvalidValue { field: "line_status", value: other.to_string() })
            }
        }
    }
}

/// Action recorded in the approval history. Raw status updates are stored
/// under the status name itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum HistoryAction {
    Request,
    Approve,
    Reject,
    Cancel,
    Status(ApprovalStatus),
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "REQUEST",
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::Cancel => "CANCEL",
            Self::Status(status) => status.as_str(),
        }
    }
}

impl From<HistoryAction> for String {
    fn from(value: HistoryAction) -> Self {
        value.as_str().to_string()
    }
}

impl TryFrom<String> for HistoryAction {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for HistoryAction {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "REQUEST" => Ok(Self::Request),
            "APPROVE" => Ok(Self::Approve),
            "REJECT" => Ok(Self::Reject),
            "CANCEL" => Ok(Self::Cancel),
            other => other.parse().map(Self::Status),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalId,
    pub document: DocumentRef,
    pub doc_number: String,
    pub task_name: String,
    pub title: String,
    pub content: Option<String>,
    pub unty_file_no: Option<String>,
    pub status: ApprovalStatus,
    pub requester_id: i64,
    pub requested_at: DateTime<Utc>,
    pub final_approver_id: Option<i64>,
    pub final_approval_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLine {
    pub id: i64,
    pub approval_id: ApprovalId,
    pub approver_id: i64,
    pub line_order: u32,
    pub status: LineStatus,
    pub comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalHistoryEntry {
    pub id: i64,
    pub approval_id: ApprovalId,
    pub actor_id: Option<i64>,
    pub action: HistoryAction,
    pub comment: String,
    pub action_date: DateTime<Utc>,
}

/// Request, lines and history as shown on the approval detail screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDetail {
    pub request: ApprovalRequest,
    pub lines: Vec<ApprovalLine>,
    pub history: Vec<ApprovalHistoryEntry>,
    pub latest_reject_comment: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalListFilter {
    pub status: Option<ApprovalStatus>,
    pub requester_id: Option<i64>,
    pub approver_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::{ApprovalStatus, DocumentRef, HistoryAction};
    use crate::errors::DomainError;

    #[test]
    fn resolve_prefers_explicit_document_ids() {
        let reference =
            DocumentRef::resolve(Some("ESTIMATE"), Some(9), None, Some(4)).expect("contract ref");
        assert_eq!(reference, DocumentRef::Contract(4));
    }

    #[test]
    fn resolve_rejects_both_estimate_and_contract() {
        let error = DocumentRef::resolve(None, None, Some(1), Some(2)).expect_err("ambiguous");
        assert!(matches!(error, DomainError::InvalidDocumentReference(_)));
    }

    #[test]
    fn resolve_rejects_missing_reference() {
        let error = DocumentRef::resolve(Some("ESTIMATE"), None, None, None).expect_err("missing");
        assert!(matches!(error, DomainError::InvalidDocumentReference(_)));
    }

    #[test]
    fn resolve_accepts_doc_type_pair_case_insensitively() {
        let reference = DocumentRef::resolve(Some("contract"), Some(12), None, None).expect("ref");
        assert_eq!(reference, DocumentRef::Contract(12));
    }

    #[test]
    fn korean_status_labels_parse_to_workflow_states() {
        assert_eq!("승인".parse::<ApprovalStatus>().expect("approved"), ApprovalStatus::Approved);
        assert_eq!("반려".parse::<ApprovalStatus>().expect("rejected"), ApprovalStatus::Rejected);
        assert_eq!(
            "승인요청".parse::<ApprovalStatus>().expect("requesting"),
            ApprovalStatus::Requesting
        );
    }

    #[test]
    fn history_action_stores_raw_status_under_its_name() {
        let action = HistoryAction::Status(ApprovalStatus::Pending);
        assert_eq!(action.as_str(), "PENDING");
        assert_eq!("PENDING".parse::<HistoryAction>().expect("parse"), action);
        assert_eq!("REJECT".parse::<HistoryAction>().expect("parse"), HistoryAction::Reject);
    }
}
