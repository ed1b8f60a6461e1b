use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Payment type label meaning "other"; the free-text value travels in `*Other`.
pub const PAYMENT_TYPE_OTHER: &str = "기타";
/// Payment types stored as-is. Anything else is shown as [`PAYMENT_TYPE_OTHER`].
pub const STANDARD_PAYMENT_TYPES: [&str; 2] = ["일시납", "월납"];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractApprovalFields {
    #[serde(default)]
    pub estimate_id: Option<i64>,
    #[serde(default)]
    pub contract_id: Option<i64>,
    #[serde(default)]
    pub version: Option<String>,
    pub project_name: String,
    #[serde(default)]
    pub customer_company_id: Option<i64>,
    #[serde(default)]
    pub end_customer_id: Option<i64>,
    #[serde(default)]
    pub sales_id: Option<i64>,
    #[serde(default)]
    pub tax_invoice_manager_id: Option<i64>,
    #[serde(default)]
    pub tax_invoice_request_date: Option<NaiveDate>,
    #[serde(default)]
    pub contract_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub contract_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub payment_type_other: Option<String>,
    #[serde(default)]
    pub payment_condition: Option<String>,
    #[serde(default)]
    pub submit_documents: Option<String>,
    #[serde(default)]
    pub sales_amount: Decimal,
    #[serde(default)]
    pub purchase_amount: Decimal,
    #[serde(default)]
    pub profit: Option<Decimal>,
    #[serde(default)]
    pub vendor_company_name: Option<String>,
    #[serde(default)]
    pub vendor_manager_name: Option<String>,
    #[serde(default)]
    pub vendor_manager_position: Option<String>,
    #[serde(default)]
    pub vendor_manager_email: Option<String>,
    #[serde(default)]
    pub vendor_manager_phone: Option<String>,
    #[serde(default)]
    pub vendor_order_request_date: Option<NaiveDate>,
    #[serde(default)]
    pub vendor_delivery_address: Option<String>,
    #[serde(default)]
    pub vendor_payment_type: Option<String>,
    #[serde(default)]
    pub vendor_payment_type_other: Option<String>,
    #[serde(default)]
    pub vendor_payment_condition: Option<String>,
    #[serde(default)]
    pub unty_file_no: Option<String>,
    #[serde(default)]
    pub special_notes: Option<String>,
}

impl ContractApprovalFields {
    /// Folds the "other" payment labels into the stored payment type and
    /// fills in profit when the client left it out.
    pub fn normalized(mut self) -> Self {
        self.payment_type = fold_other(self.payment_type.take(), self.payment_type_other.take());
        self.vendor_payment_type =
            fold_other(self.vendor_payment_type.take(), self.vendor_payment_type_other.take());
        if self.profit.is_none() {
            self.profit = Some(self.sales_amount - self.purchase_amount);
        }
        self
    }

    /// Inverse of [`normalized`](Self::normalized) for display.
    pub fn for_display(mut self) -> Self {
        (self.payment_type, self.payment_type_other) = unfold_other(self.payment_type.take());
        (self.vendor_payment_type, self.vendor_payment_type_other) =
            unfold_other(self.vendor_payment_type.take());
        self
    }
}

fn fold_other(payment_type: Option<String>, other: Option<String>) -> Option<String> {
    match payment_type {
        Some(kind) if kind == PAYMENT_TYPE_OTHER => other.filter(|text| !text.trim().is_empty()),
        kind => kind,
    }
}

fn unfold_other(stored: Option<String>) -> (Option<String>, Option<String>) {
    match stored {
        Some(kind) if !STANDARD_PAYMENT_TYPES.contains(&kind.as_str()) => {
            (Some(PAYMENT_TYPE_OTHER.to_string()), Some(kind))
        }
        kind => (kind, None),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceItemInput {
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub service_category: Option<String>,
    pub item_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub amount: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractApprovalInput {
    #[serde(flatten)]
    pub approval: ContractApprovalFields,
    #[serde(default)]
    pub service_items: Vec<ServiceItemInput>,
}

impl ContractApprovalInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        match (self.approval.estimate_id, self.approval.contract_id) {
            (Some(_), Some(_)) => {
                return Err(DomainError::InvalidDocumentReference(
                    "only one of estimateId or contractId may be provided".to_string(),
                ))
            }
            (None, None) => {
                return Err(DomainError::InvalidDocumentReference(
                    "either estimateId or contractId must be provided".to_string(),
                ))
            }
            _ => {}
        }
        if self.approval.project_name.trim().is_empty() {
            return Err(DomainError::MissingField { field: "projectName" });
        }
        if self.service_items.iter().any(|item| item.item_name.trim().is_empty()) {
            return Err(DomainError::MissingField { field: "itemName" });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractApproval {
    pub id: i64,
    /// `ORD-YYYYMMDD-NNN`
    pub contract_approval_no: String,
    #[serde(flatten)]
    pub fields: ContractApprovalFields,
    pub customer_company: Option<String>,
    pub end_customer: Option<String>,
    pub sales_nm: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceItem {
    pub id: i64,
    #[serde(flatten)]
    pub item: ServiceItemInput,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractApprovalDetail {
    #[serde(flatten)]
    pub approval: ContractApproval,
    pub service_items: Vec<ServiceItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractApprovalFilter {
    pub contract_approval_no: Option<String>,
    pub customer_company: Option<String>,
    pub end_customer: Option<String>,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ContractApprovalFields, ContractApprovalInput, PAYMENT_TYPE_OTHER};
    use crate::errors::DomainError;

    fn fields() -> ContractApprovalFields {
        ContractApprovalFields {
            estimate_id: Some(1),
            project_name: "Branch firewall refresh".to_string(),
            sales_amount: Decimal::new(1_000, 0),
            purchase_amount: Decimal::new(700, 0),
            ..ContractApprovalFields::default()
        }
    }

    #[test]
    fn other_payment_type_is_stored_as_free_text_and_shown_as_other() {
        let mut input = fields();
        input.payment_type = Some(PAYMENT_TYPE_OTHER.to_string());
        input.payment_type_other = Some("분기납".to_string());

        let stored = input.normalized();
        assert_eq!(stored.payment_type.as_deref(), Some("분기납"));
        assert_eq!(stored.profit, Some(Decimal::new(300, 0)));

        let shown = stored.for_display();
        assert_eq!(shown.payment_type.as_deref(), Some(PAYMENT_TYPE_OTHER));
        assert_eq!(shown.payment_type_other.as_deref(), Some("분기납"));
    }

    #[test]
    fn standard_payment_type_round_trips_unchanged() {
        let mut input = fields();
        input.payment_type = Some("월납".to_string());
        let shown = input.normalized().for_display();
        assert_eq!(shown.payment_type.as_deref(), Some("월납"));
        assert_eq!(shown.payment_type_other, None);
    }

    #[test]
    fn exactly_one_source_document_is_required() {
        let mut both = ContractApprovalInput { approval: fields(), service_items: Vec::new() };
        both.approval.contract_id = Some(2);
        assert!(matches!(both.validate(), Err(DomainError::InvalidDocumentReference(_))));

        let mut neither = ContractApprovalInput { approval: fields(), service_items: Vec::new() };
        neither.approval.estimate_id = None;
        assert!(matches!(neither.validate(), Err(DomainError::InvalidDocumentReference(_))));
    }
}
