//! Day-sequenced document numbers such as `APP-20240315-0002`.

use std::fmt;

use chrono::NaiveDate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Approval,
    Estimate,
    Contract,
    ContractApproval,
    ContractReview,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Approval => "APP",
            Self::Estimate => "ITS",
            Self::Contract => "CTR",
            Self::ContractApproval => "ORD",
            Self::ContractReview => "REV",
        }
    }

    pub fn width(&self) -> usize {
        match self {
            Self::Approval => 4,
            Self::Estimate | Self::Contract | Self::ContractApproval | Self::ContractReview => 3,
        }
    }

    /// `PREFIX-YYYYMMDD-`; every number issued on `day` starts with this.
    pub fn day_prefix(&self, day: NaiveDate) -> String {
        format!("{}-{}-", self.prefix(), day.format("%Y%m%d"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentNumber {
    kind: DocumentKind,
    day: NaiveDate,
    sequence: u32,
}

impl DocumentNumber {
    /// `issued_today` is how many numbers with the same day prefix already exist.
    pub fn next(kind: DocumentKind, day: NaiveDate, issued_today: i64) -> Self {
        let sequence = u32::try_from(issued_today.max(0)).unwrap_or(u32::MAX - 1) + 1;
        Self { kind, day, sequence }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:0width$}",
            self.kind.day_prefix(self.day),
            self.sequence,
            width = self.kind.width()
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{DocumentKind, DocumentNumber};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date")
    }

    #[test]
    fn approval_numbers_use_four_digit_sequence() {
        assert_eq!(DocumentNumber::next(DocumentKind::Approval, day(), 0).to_string(), "APP-20240315-0001");
        assert_eq!(DocumentNumber::next(DocumentKind::Approval, day(), 1).to_string(), "APP-20240315-0002");
    }

    #[test]
    fn estimate_and_order_numbers_use_three_digits() {
        assert_eq!(DocumentNumber::next(DocumentKind::Estimate, day(), 11).to_string(), "ITS-20240315-012");
        assert_eq!(
            DocumentNumber::next(DocumentKind::ContractApproval, day(), 0).to_string(),
            "ORD-20240315-001"
        );
        assert_eq!(
            DocumentNumber::next(DocumentKind::ContractReview, day(), 2).to_string(),
            "REV-20240315-003"
        );
    }

    #[test]
    fn sequence_grows_past_its_width() {
        assert_eq!(DocumentNumber::next(DocumentKind::Estimate, day(), 1000).to_string(), "ITS-20240315-1001");
    }
}
