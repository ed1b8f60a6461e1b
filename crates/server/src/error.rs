use axum::{http::StatusCode, Json};
use groupware_core::errors::{DomainError, ErrorClass};
use groupware_core::{AuthError, WorkflowError};
use groupware_db::RepositoryError;
use serde::Serialize;
use tracing::{error, warn};

use crate::pdf::PdfError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error: String,
}

pub type ApiFailure = (StatusCode, Json<ApiError>);
pub type ApiResult<T> = Result<Json<T>, ApiFailure>;
pub type CreatedResult<T> = Result<(StatusCode, Json<T>), ApiFailure>;

pub fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
        ErrorClass::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorClass::Forbidden => StatusCode::FORBIDDEN,
        ErrorClass::NotFound => StatusCode::NOT_FOUND,
        ErrorClass::Conflict => StatusCode::CONFLICT,
        ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn failure(status: StatusCode, message: impl Into<String>) -> ApiFailure {
    (status, Json(ApiError { error: message.into() }))
}

pub fn bad_request(message: impl Into<String>) -> ApiFailure {
    failure(StatusCode::BAD_REQUEST, message)
}

pub fn not_found(message: impl Into<String>) -> ApiFailure {
    failure(StatusCode::NOT_FOUND, message)
}

/// Database details stay in the log; the client only sees a generic message.
pub fn repository_error(err: RepositoryError) -> ApiFailure {
    let class = err.class();
    match class {
        ErrorClass::Internal => {
            error!(event_name = "api.repository.error", error = %err, "repository error");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "an internal error occurred")
        }
        ErrorClass::Conflict => {
            warn!(event_name = "api.repository.conflict", error = %err, "repository conflict");
            match err {
                RepositoryError::Domain(domain) => failure(StatusCode::CONFLICT, domain.to_string()),
                _ => failure(
                    StatusCode::CONFLICT,
                    "the change conflicts with existing or referenced records",
                ),
            }
        }
        _ => failure(status_for(class), err.to_string()),
    }
}

pub fn domain_error(err: DomainError) -> ApiFailure {
    match err.class() {
        ErrorClass::Internal => {
            error!(event_name = "api.domain.invariant", error = %err, "domain invariant violated");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "an internal error occurred")
        }
        class => failure(status_for(class), err.to_string()),
    }
}

pub fn workflow_error(err: WorkflowError) -> ApiFailure {
    failure(status_for(err.class()), err.to_string())
}

pub fn auth_error(err: AuthError) -> ApiFailure {
    match err {
        AuthError::Encoding(ref detail) | AuthError::PasswordHash(ref detail) => {
            error!(event_name = "api.auth.internal", error = %detail, "credential processing failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "an internal error occurred")
        }
        other => failure(status_for(other.class()), other.to_string()),
    }
}

pub fn io_error(err: std::io::Error) -> ApiFailure {
    error!(event_name = "api.storage.error", error = %err, "file storage error");
    failure(StatusCode::INTERNAL_SERVER_ERROR, "an internal error occurred")
}

pub fn pdf_error(err: PdfError) -> ApiFailure {
    match err {
        PdfError::UnsupportedDocument(_) => bad_request(err.to_string()),
        other => {
            error!(event_name = "api.document.render_failed", error = %other, "document rendering failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "an internal error occurred")
        }
    }
}
