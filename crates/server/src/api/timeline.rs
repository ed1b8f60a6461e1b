use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use groupware_core::domain::timeline::{TimelineEntry, TimelineInput};
use groupware_db::SqlTimelineRepository;
use tracing::info;

use crate::error::{repository_error, ApiResult, CreatedResult};
use crate::state::AppState;

fn repo(state: &AppState) -> SqlTimelineRepository {
    SqlTimelineRepository::new(state.db_pool.clone())
}

pub async fn list(
    State(state): State<AppState>,
    Path(customer_id): Path<i64>,
) -> ApiResult<Vec<TimelineEntry>> {
    repo(&state).list_for_customer(customer_id).await.map(Json).map_err(repository_error)
}

pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<TimelineInput>,
) -> CreatedResult<TimelineEntry> {
    let entry = repo(&state).create(&input).await.map_err(repository_error)?;
    info!(
        event_name = "timeline.created",
        timeline_id = entry.timeline_id,
        customer_id = entry.customer_id,
        category = %entry.category,
        "timeline entry created"
    );
    Ok((StatusCode::CREATED, Json(entry)))
}
