//! Bearer-token middleware and the caller-identity checks shared by handlers.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use groupware_core::auth::bearer_token;
use groupware_core::{AuthError, AuthUser};
use tracing::warn;

use crate::error::{auth_error, ApiFailure};
use crate::state::AppState;

/// Verifies the `Authorization: Bearer` token and stores the caller as an
/// [`AuthUser`] request extension.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let header_value = req.headers().get(header::AUTHORIZATION).and_then(|value| value.to_str().ok());

    let claims = match bearer_token(header_value).and_then(|token| state.tokens.verify(token)) {
        Ok(claims) => claims,
        Err(error) => {
            warn!(
                event_name = "auth.token.rejected",
                reason = %error,
                path = %req.uri().path(),
                "request rejected by auth middleware"
            );
            return auth_error(error).into_response();
        }
    };

    req.extensions_mut().insert(AuthUser::from(claims));
    next.run(req).await
}

/// Resolves whom an action is performed as. Only admins may act for someone else.
pub fn acting_as(caller: &AuthUser, requested: Option<i64>) -> Result<i64, ApiFailure> {
    match requested {
        Some(id) if id != caller.usr_id && !caller.is_admin() => Err(auth_error(AuthError::Forbidden)),
        Some(id) => Ok(id),
        None => Ok(caller.usr_id),
    }
}
