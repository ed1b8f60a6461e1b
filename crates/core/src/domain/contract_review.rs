use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractReviewFields {
    pub project_name: String,
    #[serde(default)]
    pub estimate_id: Option<i64>,
    #[serde(default)]
    pub execute_date: Option<NaiveDate>,
    #[serde(default)]
    pub customer_company_id: Option<i64>,
    #[serde(default)]
    pub end_customer_id: Option<i64>,
    #[serde(default)]
    pub opinion: Option<String>,
    #[serde(default)]
    pub contract_amount: Option<Decimal>,
    #[serde(default)]
    pub unty_file_no: Option<String>,
}

/// One row of the contract terms table (category, agreed standard, detail).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetailInput {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub standard: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractReviewInput {
    #[serde(flatten)]
    pub review: ContractReviewFields,
    /// Sales channel from vendor to end customer, one hop per entry.
    #[serde(default)]
    pub sales_route: Vec<String>,
    #[serde(default)]
    pub contract_details: Vec<ContractDetailInput>,
}

impl ContractReviewInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.review.project_name.trim().is_empty() {
            return Err(DomainError::MissingField { field: "projectName" });
        }
        if self.sales_route.iter().any(|hop| hop.trim().is_empty()) {
            return Err(DomainError::InvalidValue {
                field: "salesRoute",
                value: String::new(),
            });
        }
        if let Some(amount) = self.review.contract_amount.filter(|amount| amount.is_sign_negative()) {
            return Err(DomainError::InvalidValue {
                field: "contractAmount",
                value: amount.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractReview {
    pub id: i64,
    /// `REV-YYYYMMDD-NNN`
    pub contract_review_no: String,
    #[serde(flatten)]
    pub fields: ContractReviewFields,
    /// Quote number of the linked estimate.
    pub estimate_no: Option<String>,
    pub customer_company: Option<String>,
    pub end_customer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetail {
    pub id: i64,
    #[serde(flatten)]
    pub detail: ContractDetailInput,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractReviewDetail {
    #[serde(flatten)]
    pub review: ContractReview,
    pub sales_route: Vec<String>,
    pub contract_details: Vec<ContractDetail>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractReviewFilter {
    pub contract_review_no: Option<String>,
    pub project_name: Option<String>,
    pub customer_company: Option<String>,
}
