pub mod approvals;
pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod numbering;

pub use approvals::{Decision, DecisionOutcome, SubmissionInput, SubmissionPlan, WorkflowError};
pub use auth::{AuthError, AuthUser, Claims, TokenService};
pub use domain::approval::{
    ApprovalDetail, ApprovalHistoryEntry, ApprovalId, ApprovalLine, ApprovalRequest,
    ApprovalStatus, DocumentRef, DocumentType, HistoryAction, LineStatus,
};
pub use errors::{DomainError, ErrorClass};
pub use numbering::{DocumentKind, DocumentNumber};
