use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use groupware_core::domain::contract_approval::{
    ContractApproval, ContractApprovalDetail, ContractApprovalFilter, ContractApprovalInput,
};
use groupware_db::SqlContractApprovalRepository;
use serde::Serialize;
use tracing::info;

use crate::error::{not_found, repository_error, ApiResult, CreatedResult};
use crate::state::AppState;

use super::Message;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractApprovalCreated {
    pub message: &'static str,
    pub id: i64,
    pub contract_approval_no: String,
}

fn repo(state: &AppState) -> SqlContractApprovalRepository {
    SqlContractApprovalRepository::new(state.db_pool.clone())
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ContractApprovalFilter>,
) -> ApiResult<Vec<ContractApproval>> {
    repo(&state).list(&filter).await.map(Json).map_err(repository_error)
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ContractApprovalDetail> {
    repo(&state)
        .get(id)
        .await
        .map_err(repository_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("contract approval {id} not found")))
}

pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<ContractApprovalInput>,
) -> CreatedResult<ContractApprovalCreated> {
    let (id, contract_approval_no) = repo(&state).create(&input).await.map_err(repository_error)?;
    info!(
        event_name = "contract_approval.created",
        contract_approval_id = id,
        contract_approval_no = %contract_approval_no,
        service_items = input.service_items.len(),
        "contract approval created"
    );
    Ok((
        StatusCode::CREATED,
        Json(ContractApprovalCreated {
            message: "contract approval saved",
            id,
            contract_approval_no,
        }),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ContractApprovalInput>,
) -> ApiResult<Message> {
    repo(&state).update(id, &input).await.map_err(repository_error)?;
    info!(event_name = "contract_approval.updated", contract_approval_id = id, "contract approval updated");
    Ok(Json(Message::new("contract approval updated")))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Message> {
    repo(&state).delete(id).await.map_err(repository_error)?;
    info!(event_name = "contract_approval.deleted", contract_approval_id = id, "contract approval deleted");
    Ok(Json(Message::new("contract approval deleted")))
}
