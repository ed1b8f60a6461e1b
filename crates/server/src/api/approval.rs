//! Approval workflow endpoints. Wire format is snake_case.
//!
//! - `POST /approval/request`              submit a document with its approver line
//! - `POST /approval/process`              approve or reject the caller's active line
//! - `POST /approval/approve`, `/approval/reject` fixed-decision shorthands
//! - `POST /approval/cancel/{id}`          requester withdraws the request
//! - `POST /approval/updateStatus/{id}`    raw status change
//! - `GET  /approval/{id}`                 request, lines and history
//! - `GET  /approval/list`                 paginated list

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use groupware_core::approvals::{plan_submission, SubmissionInput};
use groupware_core::domain::approval::{
    ApprovalHistoryEntry, ApprovalId, ApprovalLine, ApprovalListFilter, ApprovalRequest,
    ApprovalStatus, DocumentRef,
};
use groupware_core::{AuthError, AuthUser, Decision};
use groupware_db::Page;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::acting_as;
use crate::error::{
    auth_error, bad_request, domain_error, not_found, repository_error, workflow_error, ApiResult,
};
use crate::state::AppState;

const SUCCESS: &str = "success";

#[derive(Debug, Default, Deserialize)]
pub struct ApproverEntry {
    pub approver_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitBody {
    pub doc_type: Option<String>,
    pub doc_id: Option<i64>,
    pub estimate_id: Option<i64>,
    pub contract_id: Option<i64>,
    #[serde(default)]
    pub approvers: Vec<ApproverEntry>,
    #[serde(default)]
    pub title: String,
    pub content: Option<String>,
    pub approval_task_name: Option<String>,
    pub unty_file_no: Option<String>,
    pub requester_id: Option<i64>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SubmitResponse {
    pub result: &'static str,
    pub approval_id: ApprovalId,
    pub approval_doc_number: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessBody {
    pub approval_id: i64,
    pub approver_id: Option<i64>,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DecisionBody {
    pub approval_id: i64,
    pub approver_id: Option<i64>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ProcessResponse {
    pub result: &'static str,
    pub approval_id: ApprovalId,
    pub status: ApprovalStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    pub requester_id: Option<i64>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusBody {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub comment: String,
    pub approver_id: Option<i64>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ActionResponse {
    pub result: &'static str,
    pub approval_id: ApprovalId,
    pub message: String,
}

/// Flat projection of [`ApprovalRequest`] used by the detail and list views.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ApprovalView {
    pub approval_id: ApprovalId,
    pub doc_type: &'static str,
    pub doc_id: i64,
    pub approval_doc_number: String,
    pub approval_task_name: String,
    pub title: String,
    pub content: Option<String>,
    pub unty_file_no: Option<String>,
    pub status: ApprovalStatus,
    pub requester_id: i64,
    pub request_date: DateTime<Utc>,
    pub final_approver_id: Option<i64>,
    pub final_approval_date: Option<DateTime<Utc>>,
}

impl From<ApprovalRequest> for ApprovalView {
    fn from(request: ApprovalRequest) -> Self {
        Self {
            approval_id: request.id,
            doc_type: request.document.doc_type().as_str(),
            doc_id: request.document.doc_id(),
            approval_doc_number: request.doc_number,
            approval_task_name: request.task_name,
            title: request.title,
            content: request.content,
            unty_file_no: request.unty_file_no,
            status: request.status,
            requester_id: request.requester_id,
            request_date: request.requested_at,
            final_approver_id: request.final_approver_id,
            final_approval_date: request.final_approval_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub result: &'static str,
    pub approval: ApprovalView,
    pub lines: Vec<ApprovalLine>,
    pub history: Vec<ApprovalHistoryEntry>,
    pub latest_reject_comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub requester_id: Option<i64>,
    pub approver_id: Option<i64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub result: &'static str,
    pub data: Vec<ApprovalView>,
    pub pagination: Pagination,
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<SubmitBody>,
) -> ApiResult<SubmitResponse> {
    let requester_id = acting_as(&caller, body.requester_id)?;
    let document =
        DocumentRef::resolve(body.doc_type.as_deref(), body.doc_id, body.estimate_id, body.contract_id)
            .map_err(domain_error)?;

    let plan = plan_submission(SubmissionInput {
        document,
        title: body.title,
        content: body.content,
        task_name: body.approval_task_name,
        unty_file_no: body.unty_file_no,
        requester_id,
        approvers: body.approvers.iter().map(|entry| entry.approver_id).collect(),
    })
    .map_err(workflow_error)?;
    let approver_count = plan.lines.len();

    let receipt = state.approvals.submit(plan).await.map_err(repository_error)?;
    info!(
        event_name = "approval.request.created",
        approval_id = %receipt.approval_id,
        doc_number = %receipt.doc_number,
        doc_type = document.doc_type().as_str(),
        doc_id = document.doc_id(),
        requester_id,
        approver_count,
        "approval request submitted"
    );

    Ok(Json(SubmitResponse {
        result: SUCCESS,
        approval_id: receipt.approval_id,
        approval_doc_number: receipt.doc_number,
    }))
}

pub async fn process(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<ProcessBody>,
) -> ApiResult<ProcessResponse> {
    let decision: Decision = body.action.parse().map_err(workflow_error)?;
    apply_decision(
        &state,
        &caller,
        DecisionBody {
            approval_id: body.approval_id,
            approver_id: body.approver_id,
            comment: body.comment,
        },
        decision,
    )
    .await
}

pub async fn approve(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<DecisionBody>,
) -> ApiResult<ProcessResponse> {
    apply_decision(&state, &caller, body, Decision::Approve).await
}

pub async fn reject(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<DecisionBody>,
) -> ApiResult<ProcessResponse> {
    apply_decision(&state, &caller, body, Decision::Reject).await
}

async fn apply_decision(
    state: &AppState,
    caller: &AuthUser,
    body: DecisionBody,
    decision: Decision,
) -> ApiResult<ProcessResponse> {
    let approver_id = acting_as(caller, body.approver_id)?;
    let approval_id = ApprovalId(body.approval_id);

    let status = state
        .approvals
        .process(approval_id, approver_id, decision, body.comment.trim())
        .await
        .map_err(repository_error)?;
    info!(
        event_name = "approval.line.decided",
        approval_id = %approval_id,
        approver_id,
        decision = %decision,
        status = %status,
        "approval line processed"
    );

    Ok(Json(ProcessResponse { result: SUCCESS, approval_id, status }))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<CancelBody>,
) -> ApiResult<ActionResponse> {
    let actor_id = acting_as(&caller, body.requester_id)?;
    let approval_id = ApprovalId(id);

    state
        .approvals
        .cancel(approval_id, actor_id, body.comment.trim())
        .await
        .map_err(repository_error)?;
    info!(
        event_name = "approval.request.cancelled",
        approval_id = %approval_id,
        actor_id,
        "approval request cancelled"
    );

    Ok(Json(ActionResponse {
        result: SUCCESS,
        approval_id,
        message: "approval request cancelled".to_string(),
    }))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> ApiResult<ActionResponse> {
    if body.status.trim().is_empty() {
        return Err(bad_request("status is required"));
    }
    let status: ApprovalStatus = body.status.parse().map_err(domain_error)?;
    let actor_id = acting_as(&caller, body.approver_id)?;
    let approval_id = ApprovalId(id);

    let detail = state
        .approvals
        .find_detail(approval_id)
        .await
        .map_err(repository_error)?
        .ok_or_else(|| not_found(format!("approval {approval_id} not found")))?;
    if detail.request.requester_id != caller.usr_id && !caller.is_admin() {
        return Err(auth_error(AuthError::Forbidden));
    }

    state
        .approvals
        .update_status(approval_id, status, Some(actor_id), body.comment.trim())
        .await
        .map_err(repository_error)?;
    info!(
        event_name = "approval.status.updated",
        approval_id = %approval_id,
        status = %status,
        actor_id,
        "approval status updated"
    );

    Ok(Json(ActionResponse {
        result: SUCCESS,
        approval_id,
        message: format!("status updated to {status}"),
    }))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<DetailResponse> {
    let approval_id = ApprovalId(id);
    let detail = state
        .approvals
        .find_detail(approval_id)
        .await
        .map_err(repository_error)?
        .ok_or_else(|| not_found(format!("approval {approval_id} not found")))?;

    Ok(Json(DetailResponse {
        result: SUCCESS,
        approval: detail.request.into(),
        lines: detail.lines,
        history: detail.history,
        latest_reject_comment: detail.latest_reject_comment,
    }))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<ListResponse> {
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<ApprovalStatus>().map_err(domain_error)?),
        None => None,
    };
    let filter =
        ApprovalListFilter { status, requester_id: query.requester_id, approver_id: query.approver_id };
    let page = Page::new(query.page, query.per_page);

    let (rows, total) = state.approvals.list(&filter, page).await.map_err(repository_error)?;

    Ok(Json(ListResponse {
        result: SUCCESS,
        data: rows.into_iter().map(ApprovalView::from).collect(),
        pagination: Pagination { page: page.page, per_page: page.per_page, total },
    }))
}
