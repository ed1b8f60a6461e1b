use std::path::PathBuf;
use std::sync::Arc;

use groupware_core::TokenService;
use groupware_db::{ApprovalRepository, DbPool, SqlApprovalRepository};

use crate::bootstrap::Application;
use crate::pdf::{DocumentRenderer, PdfError};

/// Shared handler state. Cheap to clone: everything heavy sits behind an `Arc`
/// or is already a pooled handle.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub approvals: Arc<dyn ApprovalRepository>,
    pub tokens: Arc<TokenService>,
    pub upload_dir: PathBuf,
    pub documents: Arc<DocumentRenderer>,
}

impl AppState {
    pub fn new(
        db_pool: DbPool,
        tokens: TokenService,
        upload_dir: PathBuf,
        documents: DocumentRenderer,
    ) -> Self {
        Self {
            approvals: Arc::new(SqlApprovalRepository::new(db_pool.clone())),
            db_pool,
            tokens: Arc::new(tokens),
            upload_dir,
            documents: Arc::new(documents),
        }
    }

    pub fn from_application(app: &Application) -> Result<Self, PdfError> {
        let documents = DocumentRenderer::new(app.config.storage.template_dir.as_deref())?;
        let tokens =
            TokenService::new(&app.config.auth.jwt_secret, app.config.auth.token_ttl_minutes);
        Ok(Self::new(app.db_pool.clone(), tokens, app.config.storage.upload_dir.clone(), documents))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use groupware_core::domain::user::{User, UserInput, ROLE_ADMIN, ROLE_USER};
    use groupware_core::{AuthUser, TokenService};
    use groupware_db::{connect_with_settings, migrations, SqlUserRepository};
    use secrecy::SecretString;

    use super::AppState;
    use crate::pdf::DocumentRenderer;

    pub const TEST_SECRET: &str = "handler-test-secret-0123456789";

    pub async fn state(upload_dir: &Path) -> AppState {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let tokens = TokenService::new(&SecretString::from(TEST_SECRET.to_string()), 60);
        let mut documents = DocumentRenderer::new(None).expect("embedded templates");
        documents.force_html();
        AppState::new(pool, tokens, upload_dir.to_path_buf(), documents)
    }

    async fn create_user(state: &AppState, login_id: &str, admin: bool) -> User {
        SqlUserRepository::new(state.db_pool.clone())
            .create(&UserInput {
                login_id: login_id.to_string(),
                name: login_id.to_uppercase(),
                password: Some(format!("{login_id}-password")),
                role_cd: Some(if admin { ROLE_ADMIN } else { ROLE_USER }.to_string()),
                ..UserInput::default()
            })
            .await
            .expect("create user")
    }

    pub async fn user(state: &AppState, login_id: &str, admin: bool) -> AuthUser {
        let created = create_user(state, login_id, admin).await;
        AuthUser { usr_id: created.id, login_id: created.login_id, role_cd: created.role_cd }
    }

    /// Creates the user and returns an `Authorization` header value for it.
    pub async fn bearer(state: &AppState, login_id: &str, admin: bool) -> String {
        let created = create_user(state, login_id, admin).await;
        let (token, _) = state.tokens.issue(&created).expect("issue token");
        format!("Bearer {token}")
    }

    pub async fn customer(state: &AppState, name: &str) -> i64 {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO customer (customer_nm, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(&now)
            .bind(&now)
            .execute(&state.db_pool)
            .await
            .expect("insert customer")
            .last_insert_rowid()
    }

    pub async fn product(state: &AppState, name: &str, price: &str) -> i64 {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO product (name, vendor, price, created_at, updated_at) VALUES (?, 'Secui', ?, ?, ?)",
        )
        .bind(name)
        .bind(price)
        .bind(&now)
        .bind(&now)
        .execute(&state.db_pool)
        .await
        .expect("insert product")
        .last_insert_rowid()
    }
}
