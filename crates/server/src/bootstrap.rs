use groupware_core::config::{AppConfig, ConfigError};
use groupware_db::{connect_with_config, migrations, DbPool};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("upload directory {path} is not usable: {source}")]
    UploadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    tokio::fs::create_dir_all(&config.storage.upload_dir).await.map_err(|source| {
        BootstrapError::UploadDir { path: config.storage.upload_dir.display().to_string(), source }
    })?;
    info!(
        event_name = "system.bootstrap.storage_ready",
        correlation_id = "bootstrap",
        upload_dir = %config.storage.upload_dir.display(),
        "upload directory ready"
    );

    Ok(Application { config, db_pool })
}

#[cfg(test)]
mod tests {
    use groupware_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        bootstrap_with_config(AppConfig::load(options)?).await
    }

    fn overrides(database_url: &str, upload_dir: &std::path::Path) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                jwt_secret: Some("bootstrap-test-secret-0123456789".to_string()),
                upload_dir: Some(upload_dir.to_path_buf()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_jwt_secret() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                jwt_secret: Some(" ".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("auth.jwt_secret"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_prepares_storage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upload_dir = dir.path().join("uploads");
        let app = bootstrap(overrides("sqlite::memory:", &upload_dir))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('approval_request', 'approval_line', 'approval_history')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("approval tables should exist after bootstrap");
        assert_eq!(table_count, 3);
        assert!(upload_dir.is_dir());

        app.db_pool.close().await;
    }
}
