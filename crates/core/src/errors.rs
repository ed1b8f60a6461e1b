use serde::Serialize;
use thiserror::Error;

use crate::approvals::WorkflowError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("invalid document reference: {0}")]
    InvalidDocumentReference(String),
    #[error("invalid value `{value}` for `{field}`")]
    InvalidValue { field: &'static str, value: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Workflow(error) => error.class(),
            Self::MissingField { .. }
            | Self::InvalidDocumentReference(_)
            | Self::InvalidValue { .. } => ErrorClass::BadRequest,
            Self::InvariantViolation(_) => ErrorClass::Internal,
        }
    }
}

/// HTTP-independent error classification shared by the server and the CLI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest => "The request could not be processed. Check inputs and try again.",
            Self::Unauthorized => "Authentication is required.",
            Self::Forbidden => "You do not have permission to perform this action.",
            Self::NotFound => "The requested resource was not found.",
            Self::Conflict => "The resource changed state and the action can no longer be applied.",
            Self::Internal => "An unexpected internal error occurred.",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::approvals::WorkflowError;
    use crate::errors::{DomainError, ErrorClass};

    #[test]
    fn missing_field_maps_to_bad_request() {
        let error = DomainError::MissingField { field: "title" };
        assert_eq!(error.class(), ErrorClass::BadRequest);
        assert_eq!(error.to_string(), "missing required field `title`");
    }

    #[test]
    fn workflow_conflict_keeps_its_class_through_domain_error() {
        let error = DomainError::from(WorkflowError::NoActiveLine { approver_id: 7 });
        assert_eq!(error.class(), ErrorClass::Conflict);
    }

    #[test]
    fn internal_class_has_user_safe_message() {
        let error = DomainError::InvariantViolation("line order gap".to_owned());
        assert_eq!(error.class().user_message(), "An unexpected internal error occurred.");
    }
}
