use std::path::{Path, PathBuf};

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use groupware_db::DbPool;
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    upload_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub storage: HealthCheck,
    pub checked_at: String,
}

/// `GET /health`, served without authentication.
pub fn router(db_pool: DbPool, upload_dir: PathBuf) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, upload_dir })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let storage = storage_check(&state.upload_dir).await;
    let ready = database.status == "ready" && storage.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "groupware-server runtime initialized".to_string(),
        },
        database,
        storage,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            warn!(event_name = "system.health.database_degraded", error = %error, "database health check failed");
            HealthCheck { status: "degraded", detail: "database query failed".to_string() }
        }
    }
}

async fn storage_check(upload_dir: &Path) -> HealthCheck {
    match tokio::fs::metadata(upload_dir).await {
        Ok(meta) if meta.is_dir() => {
            HealthCheck { status: "ready", detail: "upload directory present".to_string() }
        }
        _ => HealthCheck { status: "degraded", detail: "upload directory missing".to_string() },
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use groupware_db::connect_with_settings;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_database_and_storage_are_available() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");

        let (status, Json(payload)) = health(State(HealthState {
            db_pool: pool.clone(),
            upload_dir: dir.path().to_path_buf(),
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.storage.status, "ready");

        pool.close().await;
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool, upload_dir: dir.path().to_path_buf() })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_is_degraded_when_upload_directory_is_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");

        let (status, Json(payload)) = health(State(HealthState {
            db_pool: pool.clone(),
            upload_dir: dir.path().join("missing"),
        }))
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.storage.status, "degraded");
        assert_eq!(payload.database.status, "ready");

        pool.close().await;
    }
}
