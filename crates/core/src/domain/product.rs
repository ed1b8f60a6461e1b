use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFields {
    pub name: String,
    pub vendor: String,
    pub price: Decimal,
    #[serde(default)]
    pub fw_throughput: Option<String>,
    #[serde(default)]
    pub ips_throughput: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
}

impl ProductFields {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::MissingField { field: "name" });
        }
        if self.vendor.trim().is_empty() {
            return Err(DomainError::MissingField { field: "vendor" });
        }
        if self.price.is_sign_negative() {
            return Err(DomainError::InvalidValue { field: "price", value: self.price.to_string() });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    #[serde(flatten)]
    pub fields: ProductFields,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub name: Option<String>,
    pub vendor: Option<String>,
}

/// One page of the catalog plus the unpaged match count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total_count: i64,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::ProductFields;
    use crate::errors::DomainError;

    #[test]
    fn negative_price_is_rejected() {
        let fields = ProductFields {
            name: "NGFW 3000".to_string(),
            vendor: "Acme".to_string(),
            price: Decimal::new(-100, 0),
            ..ProductFields::default()
        };
        assert!(matches!(fields.validate(), Err(DomainError::InvalidValue { field: "price", .. })));
    }
}
