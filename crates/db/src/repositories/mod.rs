use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use groupware_core::approvals::{Decision, SubmissionPlan, WorkflowError};
use groupware_core::domain::approval::{
    ApprovalDetail, ApprovalId, ApprovalListFilter, ApprovalRequest, ApprovalStatus,
};
use groupware_core::auth::AuthError;
use groupware_core::errors::{DomainError, ErrorClass};

pub mod approval;
pub mod attachment;
pub mod contract;
pub mod contract_approval;
pub mod contract_review;
pub mod customer;
pub mod estimate;
pub mod permission;
pub mod product;
pub mod timeline;
pub mod user;
pub(crate) mod rows;

pub use approval::SqlApprovalRepository;
pub use attachment::SqlAttachmentRepository;
pub use contract::SqlContractRepository;
pub use contract_approval::SqlContractApprovalRepository;
pub use contract_review::SqlContractReviewRepository;
pub use customer::SqlCustomerRepository;
pub use estimate::SqlEstimateRepository;
pub use permission::SqlPermissionRepository;
pub use product::SqlProductRepository;
pub use timeline::SqlTimelineRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Database(sqlx::Error::Database(db))
                if db.is_unique_violation() || db.is_foreign_key_violation() =>
            {
                ErrorClass::Conflict
            }
            Self::Database(_) | Self::Decode(_) => ErrorClass::Internal,
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::Domain(error) => error.class(),
            Self::Auth(error) => error.class(),
        }
    }
}

impl From<WorkflowError> for RepositoryError {
    fn from(value: WorkflowError) -> Self {
        Self::Domain(DomainError::Workflow(value))
    }
}

/// 1-based page request for list endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub const DEFAULT_PER_PAGE: u32 = 10;
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(Self::DEFAULT_PER_PAGE).clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalReceipt {
    pub approval_id: ApprovalId,
    pub doc_number: String,
}

/// Persistence for the approval workflow. Every mutating call runs in a single
/// transaction and leaves no partial state behind on error.
#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn submit(&self, plan: SubmissionPlan) -> Result<ApprovalReceipt, RepositoryError>;

    async fn process(
        &self,
        approval_id: ApprovalId,
        approver_id: i64,
        decision: Decision,
        comment: &str,
    ) -> Result<ApprovalStatus, RepositoryError>;

    async fn cancel(
        &self,
        approval_id: ApprovalId,
        actor_id: i64,
        comment: &str,
    ) -> Result<(), RepositoryError>;

    async fn update_status(
        &self,
        approval_id: ApprovalId,
        status: ApprovalStatus,
        actor_id: Option<i64>,
        comment: &str,
    ) -> Result<(), RepositoryError>;

    async fn find_detail(
        &self,
        approval_id: ApprovalId,
    ) -> Result<Option<ApprovalDetail>, RepositoryError>;

    async fn list(
        &self,
        filter: &ApprovalListFilter,
        page: Page,
    ) -> Result<(Vec<ApprovalRequest>, i64), RepositoryError>;
}


#[cfg(test)]
mod tests {
    use super::Page;

    #[test]
    fn page_clamps_to_sane_bounds() {
        let page = Page::new(Some(0), Some(1_000));
        assert_eq!(page, Page { page: 1, per_page: Page::MAX_PER_PAGE });
        assert_eq!(Page::new(Some(3), Some(20)).offset(), 40);
    }
}
