use super::RepositoryError;
use crate::DbPool;

/// Role to screen grants read by the front end to build its menu.
pub struct SqlPermissionRepository {
    pool: DbPool,
}

impl SqlPermissionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Screen paths granted to `role_cd`, sorted. An unknown role has none.
    pub async fn allowed_screens(&self, role_cd: &str) -> Result<Vec<String>, RepositoryError> {
        let paths = sqlx::query_scalar(
            "SELECT DISTINCT s.path
             FROM screen_permission sp
             JOIN screen s ON s.id = sp.screen_id
             WHERE sp.role_cd = ?
             ORDER BY s.path ASC",
        )
        .bind(role_cd.trim())
        .fetch_all(&self.pool)
        .await?;
        Ok(paths)
    }
}
