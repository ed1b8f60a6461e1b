use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerFields {
    pub customer_nm: String,
    #[serde(default)]
    pub customer_type: Option<String>,
    #[serde(default)]
    pub biz_num: Option<String>,
    #[serde(default)]
    pub mng_nm: Option<String>,
    #[serde(default)]
    pub tel_no: Option<String>,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub address3: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub engineer_id: Option<i64>,
    #[serde(default)]
    pub sales_id: Option<i64>,
    #[serde(default)]
    pub unty_file_no: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerFields {
    pub manager_nm: String,
    #[serde(default)]
    pub depart_nm: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tel_no: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

/// Create/update body: the customer and the full replacement list of managers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInput {
    pub customer: CustomerFields,
    #[serde(default)]
    pub managers: Vec<ManagerFields>,
}

impl CustomerInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.customer.customer_nm.trim().is_empty() {
            return Err(DomainError::MissingField { field: "customerNm" });
        }
        if self.managers.iter().any(|manager| manager.manager_nm.trim().is_empty()) {
            return Err(DomainError::MissingField { field: "managerNm" });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub customer_id: i64,
    #[serde(flatten)]
    pub fields: CustomerFields,
    pub sales_nm: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerManager {
    pub customer_id: i64,
    /// 1-based position within the customer's contact list.
    pub manager_seq: i64,
    #[serde(flatten)]
    pub fields: ManagerFields,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetail {
    pub customer: Customer,
    pub managers: Vec<CustomerManager>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerFilter {
    pub name: Option<String>,
    pub sales_id: Option<i64>,
}
