use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// New customer timeline event. Snake-case keys are accepted for older clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineInput {
    #[serde(default, alias = "customer_id")]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub category: String,
    #[serde(default, alias = "event_date")]
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub person: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

impl TimelineInput {
    /// Returns the customer id once every required field is present.
    pub fn validate(&self) -> Result<(i64, NaiveDate), DomainError> {
        let customer_id = self.customer_id.ok_or(DomainError::MissingField { field: "customerId" })?;
        if self.category.trim().is_empty() {
            return Err(DomainError::MissingField { field: "category" });
        }
        let event_date = self.event_date.ok_or(DomainError::MissingField { field: "eventDate" })?;
        if self.description.trim().is_empty() {
            return Err(DomainError::MissingField { field: "description" });
        }
        Ok((customer_id, event_date))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub timeline_id: i64,
    pub customer_id: i64,
    pub category: String,
    #[serde(rename = "date")]
    pub event_date: NaiveDate,
    pub description: String,
    pub person: Option<String>,
    pub amount: Option<Decimal>,
    /// Customer name.
    pub company: String,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::TimelineInput;
    use crate::errors::DomainError;

    #[test]
    fn accepts_snake_case_keys_and_requires_core_fields() {
        let input: TimelineInput = serde_json::from_str(
            r#"{"customer_id": 7, "category": "meeting", "event_date": "2024-05-02",
                "description": "Kick-off"}"#,
        )
        .expect("parse");
        assert_eq!(
            input.validate(),
            Ok((7, NaiveDate::from_ymd_opt(2024, 5, 2).expect("date")))
        );

        let missing = TimelineInput { customer_id: Some(7), ..TimelineInput::default() };
        assert_eq!(missing.validate(), Err(DomainError::MissingField { field: "category" }));
        let no_customer = TimelineInput::default();
        assert_eq!(no_customer.validate(), Err(DomainError::MissingField { field: "customerId" }));
    }
}
