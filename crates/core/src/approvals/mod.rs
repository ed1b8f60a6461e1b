//! Approval line state machine.
//!
//! Everything here is pure: the repository loads a request with its lines,
//! asks this module what should change, and writes the outcome inside one
//! transaction. Keeping the rules out of SQL lets them be tested without a
//! database.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::approval::{
    ApprovalLine, ApprovalRequest, ApprovalStatus, DocumentRef, HistoryAction, LineStatus,
};
use crate::errors::ErrorClass;

/// Comment written on lines that were still pending when an earlier approver rejected.
pub const CASCADE_REJECT_COMMENT: &str = "Rejected automatically: an earlier approver rejected this request";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("approval title is required")]
    MissingTitle,
    #[error("at least one approver is required")]
    NoApprovers,
    #[error("approver {approver_id} appears more than once in the approval line")]
    DuplicateApprover { approver_id: i64 },
    #[error("`{field}` must be a positive id, got {value}")]
    InvalidId { field: &'static str, value: i64 },
    #[error("unknown approval action `{0}`")]
    UnknownAction(String),
    #[error("no active line found for approver {approver_id}")]
    NoActiveLine { approver_id: i64 },
    #[error("approval request is already {status}")]
    RequestClosed { status: ApprovalStatus },
    #[error("only the requester may cancel this approval (requester {requester_id})")]
    NotRequester { requester_id: i64 },
    #[error("approval request in status {status} cannot be cancelled")]
    NotCancellable { status: ApprovalStatus },
    #[error("status {status} is reached through approve, reject or cancel, not a status update")]
    TerminalStatusOverride { status: ApprovalStatus },
}

impl WorkflowError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingTitle
            | Self::NoApprovers
            | Self::DuplicateApprover { .. }
            | Self::InvalidId { .. }
            | Self::UnknownAction(_)
            | Self::TerminalStatusOverride { .. } => ErrorClass::BadRequest,
            Self::NotRequester { .. } => ErrorClass::Forbidden,
            Self::NoActiveLine { .. } | Self::RequestClosed { .. } | Self::NotCancellable { .. } => {
                ErrorClass::Conflict
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn line_status(&self) -> LineStatus {
        match self {
            Self::Approve => LineStatus::Approved,
            Self::Reject => LineStatus::Rejected,
        }
    }

    pub fn history_action(&self) -> HistoryAction {
        match self {
            Self::Approve => HistoryAction::Approve,
            Self::Reject => HistoryAction::Reject,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
        })
    }
}

impl FromStr for Decision {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "APPROVE" | "APPROVED" | "승인" => Ok(Self::Approve),
            "REJECT" | "REJECTED" | "반려" => Ok(Self::Reject),
            _ => Err(WorkflowError::UnknownAction(trimmed.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionInput {
    pub document: DocumentRef,
    pub title: String,
    pub content: Option<String>,
    pub task_name: Option<String>,
    pub unty_file_no: Option<String>,
    pub requester_id: i64,
    pub approvers: Vec<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlannedLine {
    pub approver_id: i64,
    pub line_order: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionPlan {
    pub document: DocumentRef,
    pub title: String,
    pub content: Option<String>,
    pub task_name: String,
    pub unty_file_no: Option<String>,
    pub requester_id: i64,
    pub status: ApprovalStatus,
    pub lines: Vec<PlannedLine>,
}

pub const DEFAULT_TASK_NAME: &str = "APPROVAL";

/// Validates a submission and numbers its lines `1..=N` in the order given.
pub fn plan_submission(input: SubmissionInput) -> Result<SubmissionPlan, WorkflowError> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(WorkflowError::MissingTitle);
    }
    if input.requester_id <= 0 {
        return Err(WorkflowError::InvalidId { field: "requester_id", value: input.requester_id });
    }
    if input.approvers.is_empty() {
        return Err(WorkflowError::NoApprovers);
    }

    let mut seen = HashSet::with_capacity(input.approvers.len());
    let mut lines = Vec::with_capacity(input.approvers.len());
    for (index, approver_id) in input.approvers.iter().copied().enumerate() {
        if approver_id <= 0 {
            return Err(WorkflowError::InvalidId { field: "approver_id", value: approver_id });
        }
        if !seen.insert(approver_id) {
            return Err(WorkflowError::DuplicateApprover { approver_id });
        }
        lines.push(PlannedLine { approver_id, line_order: index as u32 + 1 });
    }

    let task_name = input
        .task_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_TASK_NAME.to_string());

    Ok(SubmissionPlan {
        document: input.document,
        title,
        content: input.content.filter(|content| !content.trim().is_empty()),
        task_name,
        unty_file_no: input.unty_file_no.filter(|group| !group.trim().is_empty()),
        requester_id: input.requester_id,
        status: ApprovalStatus::Requesting,
        lines,
    })
}

/// The lowest-order pending line, provided every line before it is approved.
pub fn active_line(lines: &[ApprovalLine]) -> Option<&ApprovalLine> {
    let mut ordered: Vec<&ApprovalLine> = lines.iter().collect();
    ordered.sort_by_key(|line| line.line_order);

    for line in ordered {
        match line.status {
            LineStatus::Approved => continue,
            LineStatus::Pending => return Some(line),
            LineStatus::Rejected | LineStatus::Cancelled => return None,
        }
    }
    None
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub line_id: i64,
    pub line_status: LineStatus,
    /// Higher-order pending lines rejected alongside a rejection.
    pub cascaded_line_ids: Vec<i64>,
    pub request_status: ApprovalStatus,
    pub final_approver_id: Option<i64>,
    pub history_action: HistoryAction,
}

impl DecisionOutcome {
    pub fn is_final(&self) -> bool {
        self.final_approver_id.is_some()
    }
}

pub fn decide(
    request: &ApprovalRequest,
    lines: &[ApprovalLine],
    approver_id: i64,
    decision: Decision,
) -> Result<DecisionOutcome, WorkflowError> {
    if request.status.is_closed() {
        return Err(WorkflowError::RequestClosed { status: request.status });
    }

    let active = active_line(lines)
        .filter(|line| line.approver_id == approver_id)
        .ok_or(WorkflowError::NoActiveLine { approver_id })?;

    let later_pending = lines
        .iter()
        .filter(|line| line.line_order > active.line_order && line.status == LineStatus::Pending);

    let outcome = match decision {
        Decision::Approve => {
            let has_next = later_pending.count() > 0;
            DecisionOutcome {
                line_id: active.id,
                line_status: LineStatus::Approved,
                cascaded_line_ids: Vec::new(),
                request_status: if has_next {
                    ApprovalStatus::Pending
                } else {
                    ApprovalStatus::Approved
                },
                final_approver_id: (!has_next).then_some(approver_id),
                history_action: decision.history_action(),
            }
        }
        Decision::Reject => {
            let mut cascaded: Vec<&ApprovalLine> = later_pending.collect();
            cascaded.sort_by_key(|line| line.line_order);
            DecisionOutcome {
                line_id: active.id,
                line_status: LineStatus::Rejected,
                cascaded_line_ids: cascaded.into_iter().map(|line| line.id).collect(),
                request_status: ApprovalStatus::Rejected,
                final_approver_id: Some(approver_id),
                history_action: decision.history_action(),
            }
        }
    };

    Ok(outcome)
}

/// Checks that `actor_id` may cancel `request`.
pub fn plan_cancel(request: &ApprovalRequest, actor_id: i64) -> Result<(), WorkflowError> {
    if request.requester_id != actor_id {
        return Err(WorkflowError::NotRequester { requester_id: request.requester_id });
    }
    if request.status.is_closed() {
        return Err(WorkflowError::NotCancellable { status: request.status });
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusUpdatePlan {
    pub status: ApprovalStatus,
    pub history_action: Option<HistoryAction>,
}

/// Raw status override for an open request. Terminal statuses only come from
/// [`decide`] and [`plan_cancel`]. Moving back to REQUESTING writes no history
/// row so the submission's REQUEST entry is not duplicated.
pub fn plan_status_update(
    request: &ApprovalRequest,
    status: ApprovalStatus,
) -> Result<StatusUpdatePlan, WorkflowError> {
    if request.status.is_closed() {
        return Err(WorkflowError::RequestClosed { status: request.status });
    }
    if status.is_closed() {
        return Err(WorkflowError::TerminalStatusOverride { status });
    }

    let history_action = match status {
        ApprovalStatus::Requesting => None,
        other => Some(HistoryAction::Status(other)),
    };
    Ok(StatusUpdatePlan { status, history_action })
}
