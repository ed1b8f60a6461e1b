use axum::{extract::State, Json};
use groupware_core::auth::verify_password;
use groupware_core::{AuthError, Claims};
use groupware_db::SqlUserRepository;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{auth_error, bad_request, repository_error, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LoginBody {
    #[serde(default, alias = "loginId")]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
    pub user: Claims,
}

/// `POST /login`. Unknown users and wrong passwords get the same 401.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> ApiResult<LoginResponse> {
    let login_id = body.username.trim();
    if login_id.is_empty() || body.password.is_empty() {
        return Err(bad_request("username and password are required"));
    }

    let credentials = SqlUserRepository::new(state.db_pool.clone())
        .find_credentials_by_login(login_id)
        .await
        .map_err(repository_error)?
        .filter(|creds| verify_password(&body.password, &creds.password_hash));
    let Some(credentials) = credentials else {
        warn!(event_name = "auth.login.failed", login_id, "login rejected");
        return Err(auth_error(AuthError::BadCredentials));
    };

    let (token, claims) = state.tokens.issue(&credentials.user).map_err(auth_error)?;
    info!(
        event_name = "auth.login.succeeded",
        usr_id = claims.usr_id,
        role_cd = %claims.role_cd,
        "token issued"
    );

    Ok(Json(LoginResponse { message: "login successful", token, user: claims }))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use super::{login, LoginBody};
    use crate::state::test_support;

    #[tokio::test]
    async fn valid_credentials_issue_a_verifiable_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_support::state(dir.path()).await;
        let user = test_support::user(&state, "sales01", false).await;

        let Json(response) = login(
            State(state.clone()),
            Json(LoginBody { username: "sales01".to_string(), password: "sales01-password".to_string() }),
        )
        .await
        .expect("login");

        let claims = state.tokens.verify(&response.token).expect("token verifies");
        assert_eq!(claims.usr_id, user.usr_id);
        assert_eq!(response.user.login_id, "sales01");
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_unauthorized() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_support::state(dir.path()).await;
        test_support::user(&state, "sales01", false).await;

        for (username, password) in [("sales01", "nope"), ("ghost", "whatever")] {
            let (status, body) = login(
                State(state.clone()),
                Json(LoginBody { username: username.to_string(), password: password.to_string() }),
            )
            .await
            .expect_err("rejected");
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body.0.error, "invalid login id or password");
        }

        let (status, _) = login(State(state), Json(LoginBody::default())).await.expect_err("empty");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
