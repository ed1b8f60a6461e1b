use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approval::ApprovalStatus;
use crate::errors::DomainError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateFields {
    pub quote_title: String,
    pub customer_id: i64,
    #[serde(default)]
    pub sales_id: Option<i64>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub delivery_condition: Option<String>,
    #[serde(default)]
    pub payment_condition: Option<String>,
    #[serde(default)]
    pub warranty_period: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub opinion: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub quote_amount: Option<Decimal>,
    #[serde(default)]
    pub total_price_before_vat: Decimal,
    #[serde(default)]
    pub vat: Decimal,
    #[serde(default)]
    pub total_price_with_vat: Decimal,
    #[serde(default)]
    pub unty_file_no: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateLineInput {
    pub product_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Decimal,
    /// Percentage, 0..=100.
    #[serde(default)]
    pub discount_rate: Decimal,
    #[serde(default)]
    pub total_price: Option<Decimal>,
    #[serde(default)]
    pub final_price: Option<Decimal>,
}

fn default_quantity() -> i64 {
    1
}

impl EstimateLineInput {
    /// Line totals, computing whichever of total/final price the client omitted.
    pub fn priced(&self) -> (Decimal, Decimal) {
        let total = self.total_price.unwrap_or_else(|| self.unit_price * Decimal::from(self.quantity));
        let final_price = self.final_price.unwrap_or_else(|| {
            total * (Decimal::ONE_HUNDRED - self.discount_rate) / Decimal::ONE_HUNDRED
        });
        (total, final_price.round_dp(2))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateInput {
    #[serde(flatten)]
    pub estimate: EstimateFields,
    #[serde(default)]
    pub products: Vec<EstimateLineInput>,
}

impl EstimateInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.estimate.quote_title.trim().is_empty() {
            return Err(DomainError::MissingField { field: "quoteTitle" });
        }
        if self.estimate.customer_id <= 0 {
            return Err(DomainError::MissingField { field: "customerId" });
        }
        for line in &self.products {
            if line.quantity <= 0 {
                return Err(DomainError::InvalidValue {
                    field: "quantity",
                    value: line.quantity.to_string(),
                });
            }
            if line.discount_rate < Decimal::ZERO || line.discount_rate > Decimal::ONE_HUNDRED {
                return Err(DomainError::InvalidValue {
                    field: "discountRate",
                    value: line.discount_rate.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    pub estimate_id: i64,
    /// `ITS-YYYYMMDD-NNN`
    pub quote_id: String,
    #[serde(flatten)]
    pub fields: EstimateFields,
    pub customer_nm: Option<String>,
    pub sales_nm: Option<String>,
    /// Status of the most recent approval request raised for this estimate.
    pub approval_status: Option<ApprovalStatus>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateLine {
    pub line_id: i64,
    pub product_id: i64,
    pub product_name: Option<String>,
    pub vendor: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub discount_rate: Decimal,
    pub total_price: Decimal,
    pub final_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateDetail {
    #[serde(flatten)]
    pub estimate: Estimate,
    pub products: Vec<EstimateLine>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateFilter {
    pub customer_name: Option<String>,
    pub title: Option<String>,
    pub quote_no: Option<String>,
    pub sales_name: Option<String>,
    pub status: Option<ApprovalStatus>,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::EstimateLineInput;

    #[test]
    fn missing_prices_are_derived_from_quantity_and_discount() {
        let line = EstimateLineInput {
            product_id: 1,
            quantity: 3,
            unit_price: Decimal::new(10_000, 0),
            discount_rate: Decimal::new(15, 0),
            total_price: None,
            final_price: None,
        };
        assert_eq!(line.priced(), (Decimal::new(30_000, 0), Decimal::new(25_500, 0)));
    }

    #[test]
    fn client_supplied_prices_are_kept() {
        let line = EstimateLineInput {
            product_id: 1,
            quantity: 1,
            unit_price: Decimal::new(500, 0),
            discount_rate: Decimal::ZERO,
            total_price: Some(Decimal::new(450, 0)),
            final_price: Some(Decimal::new(400, 0)),
        };
        assert_eq!(line.priced(), (Decimal::new(450, 0), Decimal::new(400, 0)));
    }
}
