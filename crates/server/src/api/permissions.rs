use axum::{
    extract::{Query, State},
    Json,
};
use groupware_db::SqlPermissionRepository;
use serde::{Deserialize, Serialize};

use crate::error::{bad_request, repository_error, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ScreenQuery {
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedScreens {
    pub allowed_screens: Vec<String>,
}

pub async fn screens(
    State(state): State<AppState>,
    Query(query): Query<ScreenQuery>,
) -> ApiResult<AllowedScreens> {
    let Some(role) = query.role.filter(|role| !role.trim().is_empty()) else {
        return Err(bad_request("role parameter is required"));
    };
    let allowed_screens = SqlPermissionRepository::new(state.db_pool.clone())
        .allowed_screens(&role)
        .await
        .map_err(repository_error)?;
    Ok(Json(AllowedScreens { allowed_screens }))
}
