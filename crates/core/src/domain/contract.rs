use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractFields {
    pub contract_name: String,
    pub customer_id: i64,
    #[serde(default)]
    pub estimate_id: Option<i64>,
    #[serde(default)]
    pub sales_id: Option<i64>,
    #[serde(default)]
    pub contract_dt: Option<NaiveDate>,
    #[serde(default)]
    pub contract_start_dt: Option<NaiveDate>,
    #[serde(default)]
    pub contract_end_dt: Option<NaiveDate>,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub tax_type: Option<String>,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(default)]
    pub pay_terms: Option<String>,
    #[serde(default)]
    pub warranty_period: Option<String>,
    #[serde(default)]
    pub delivery_dt: Option<NaiveDate>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub unty_file_no: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractLineInput {
    pub product_id: i64,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default)]
    pub total_price: Decimal,
    #[serde(default)]
    pub sales_dt: Option<NaiveDate>,
    #[serde(default)]
    pub sales_cycle: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInput {
    #[serde(flatten)]
    pub contract: ContractFields,
    #[serde(default)]
    pub products: Vec<ContractLineInput>,
}

impl ContractInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        let contract = &self.contract;
        if contract.contract_name.trim().is_empty() {
            return Err(DomainError::MissingField { field: "contractName" });
        }
        if contract.customer_id <= 0 {
            return Err(DomainError::MissingField { field: "customerId" });
        }
        if let (Some(start), Some(end)) = (contract.contract_start_dt, contract.contract_end_dt) {
            if end < start {
                return Err(DomainError::InvalidValue {
                    field: "contractEndDt",
                    value: end.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub contract_id: i64,
    pub contract_no: String,
    #[serde(flatten)]
    pub fields: ContractFields,
    pub customer_nm: Option<String>,
    pub sales_nm: Option<String>,
    /// Set when an approval request is raised for this contract.
    pub approval_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractLine {
    pub line_id: i64,
    pub product_name: Option<String>,
    #[serde(flatten)]
    pub line: ContractLineInput,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetail {
    #[serde(flatten)]
    pub contract: Contract,
    pub products: Vec<ContractLine>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractFilter {
    /// Matches contract name, contract number or customer name.
    pub search: Option<String>,
    pub sales_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{ContractFields, ContractInput};
    use crate::errors::DomainError;

    #[test]
    fn end_before_start_is_rejected() {
        let input = ContractInput {
            contract: ContractFields {
                contract_name: "Annual maintenance".to_string(),
                customer_id: 3,
                contract_start_dt: NaiveDate::from_ymd_opt(2024, 5, 1),
                contract_end_dt: NaiveDate::from_ymd_opt(2024, 4, 1),
                ..ContractFields::default()
            },
            products: Vec::new(),
        };
        assert!(matches!(
            input.validate(),
            Err(DomainError::InvalidValue { field: "contractEndDt", .. })
        ));
    }
}
