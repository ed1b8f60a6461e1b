use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use groupware_core::domain::user::{User, UserInput, ROLE_ADMIN};
use groupware_core::{AuthError, AuthUser};
use groupware_db::SqlUserRepository;
use tracing::info;

use crate::error::{auth_error, not_found, repository_error, ApiResult, CreatedResult};
use crate::state::AppState;

use super::Message;

fn repo(state: &AppState) -> SqlUserRepository {
    SqlUserRepository::new(state.db_pool.clone())
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    repo(&state).list().await.map(Json).map_err(repository_error)
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<User> {
    repo(&state)
        .get(id)
        .await
        .map_err(repository_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("user {id} not found")))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(input): Json<UserInput>,
) -> CreatedResult<User> {
    caller.require_role(&[ROLE_ADMIN]).map_err(auth_error)?;
    let user = repo(&state).create(&input).await.map_err(repository_error)?;
    info!(event_name = "user.created", usr_id = user.id, by = caller.usr_id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Users may edit their own profile; only admins may edit others or change roles.
pub async fn update(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(mut input): Json<UserInput>,
) -> ApiResult<User> {
    if !caller.is_admin() {
        if caller.usr_id != id {
            return Err(auth_error(AuthError::Forbidden));
        }
        input.role_cd = Some(caller.role_cd.clone());
    }
    let user = repo(&state).update(id, &input).await.map_err(repository_error)?;
    info!(event_name = "user.updated", usr_id = id, by = caller.usr_id, "user updated");
    Ok(Json(user))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Message> {
    caller.require_role(&[ROLE_ADMIN]).map_err(auth_error)?;
    repo(&state).delete(id).await.map_err(repository_error)?;
    info!(event_name = "user.deleted", usr_id = id, by = caller.usr_id, "user deleted");
    Ok(Json(Message::new("user deleted")))
}
