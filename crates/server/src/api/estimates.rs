use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use groupware_core::domain::estimate::{Estimate, EstimateDetail, EstimateFilter, EstimateInput};
use groupware_db::SqlEstimateRepository;
use serde::Serialize;
use tracing::info;

use crate::error::{not_found, repository_error, ApiResult, CreatedResult};
use crate::state::AppState;

use super::Message;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateCreated {
    pub message: &'static str,
    pub estimate_id: i64,
    pub quote_id: String,
}

fn repo(state: &AppState) -> SqlEstimateRepository {
    SqlEstimateRepository::new(state.db_pool.clone())
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<EstimateFilter>,
) -> ApiResult<Vec<Estimate>> {
    repo(&state).list(&filter).await.map(Json).map_err(repository_error)
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<EstimateDetail> {
    repo(&state)
        .get(id)
        .await
        .map_err(repository_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("estimate {id} not found")))
}

pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<EstimateInput>,
) -> CreatedResult<EstimateCreated> {
    let (estimate_id, quote_id) = repo(&state).create(&input).await.map_err(repository_error)?;
    info!(
        event_name = "estimate.created",
        estimate_id,
        quote_id = %quote_id,
        lines = input.products.len(),
        "estimate created"
    );
    Ok((
        StatusCode::CREATED,
        Json(EstimateCreated { message: "estimate saved", estimate_id, quote_id }),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<EstimateInput>,
) -> ApiResult<Message> {
    repo(&state).update(id, &input).await.map_err(repository_error)?;
    info!(event_name = "estimate.updated", estimate_id = id, "estimate updated");
    Ok(Json(Message::new("estimate updated")))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Message> {
    repo(&state).delete(id).await.map_err(repository_error)?;
    info!(event_name = "estimate.deleted", estimate_id = id, "estimate deleted");
    Ok(Json(Message::new("estimate deleted")))
}
