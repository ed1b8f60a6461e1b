use sqlx::sqlite::SqliteRow;

use groupware_core::auth::hash_password;
use groupware_core::domain::user::{User, UserCredentials, UserInput};

use super::rows::{self, col, now_text, timestamp};
use super::RepositoryError;
use crate::DbPool;

const USER_COLUMNS: &str =
    "id, login_id, name, email, phone, role_cd, depart_cd, position, created_at";

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: &UserInput) -> Result<User, RepositoryError> {
        input.validate(true)?;
        let password_hash = hash_password(input.password.as_deref().unwrap_or_default())?;
        let now = now_text();

        let id = sqlx::query(
            "INSERT INTO users (
                login_id, name, email, phone, role_cd, depart_cd, position,
                password_hash, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(input.login_id.trim())
        .bind(input.name.trim())
        .bind(&input.email)
        .bind(&input.phone)
        .bind(input.role_or_default())
        .bind(&input.depart_cd)
        .bind(&input.position)
        .bind(&password_hash)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get(id).await?.ok_or_else(|| RepositoryError::not_found("user", id))
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(row_to_user)
            .transpose()
    }

    pub async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC");
        sqlx::query(&sql).fetch_all(&self.pool).await?.iter().map(row_to_user).collect()
    }

    /// Updates profile fields. A non-empty password is re-hashed with a fresh salt.
    pub async fn update(&self, id: i64, input: &UserInput) -> Result<User, RepositoryError> {
        input.validate(false)?;
        let password_hash = input
            .password
            .as_deref()
            .filter(|pw| !pw.is_empty())
            .map(hash_password)
            .transpose()?;
        let now = now_text();
        let mut tx = rows::begin_write(&self.pool).await?;

        let updated = sqlx::query(
            "UPDATE users SET login_id = ?, name = ?, email = ?, phone = ?, role_cd = ?,
                depart_cd = ?, position = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(input.login_id.trim())
        .bind(input.name.trim())
        .bind(&input.email)
        .bind(&input.phone)
        .bind(input.role_or_default())
        .bind(&input.depart_cd)
        .bind(&input.position)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::not_found("user", id));
        }

        if let Some(password_hash) = password_hash {
            sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
                .bind(&password_hash)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.get(id).await?.ok_or_else(|| RepositoryError::not_found("user", id))
    }

    pub async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let deleted = sqlx::query("DELETE FROM users WHERE id = ?").bind(id).execute(&self.pool).await?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::not_found("user", id));
        }
        Ok(())
    }

    pub async fn find_credentials_by_login(
        &self,
        login_id: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE login_id = ?"
        );
        let Some(row) = sqlx::query(&sql).bind(login_id.trim()).fetch_optional(&self.pool).await?
        else {
            return Ok(None);
        };

        Ok(Some(UserCredentials {
            user: row_to_user(&row)?,
            password_hash: col(&row, "password_hash")?,
        }))
    }

    pub async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await?)
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: col(row, "id")?,
        login_id: col(row, "login_id")?,
        name: col(row, "name")?,
        email: col(row, "email")?,
        phone: col(row, "phone")?,
        role_cd: col(row, "role_cd")?,
        depart_cd: col(row, "depart_cd")?,
        position: col(row, "position")?,
        created_at: timestamp(row, "created_at")?,
    })
}
