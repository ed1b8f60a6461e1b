use sqlx::sqlite::SqliteRow;

use groupware_core::domain::attachment::Attachment;

use super::rows::{col, now_text, timestamp};
use super::RepositoryError;
use crate::DbPool;

const ATTACHMENT_COLUMNS: &str =
    "id, unty_file_no, file_seq, file_name, file_path, size_bytes, created_at";

/// File metadata rows. The bytes themselves live under the configured upload directory.
pub struct SqlAttachmentRepository {
    pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAttachment {
    pub unty_file_no: String,
    pub file_name: String,
    pub file_path: String,
    pub size_bytes: i64,
}

impl SqlAttachmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Next sequence within the group, continuing from its current max.
    pub async fn next_seq(&self, unty_file_no: &str) -> Result<i64, RepositoryError> {
        let max: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(file_seq), 0) FROM attachment WHERE unty_file_no = ?",
        )
        .bind(unty_file_no)
        .fetch_one(&self.pool)
        .await?;
        Ok(max + 1)
    }

    pub async fn add(&self, file: NewAttachment, file_seq: i64) -> Result<Attachment, RepositoryError> {
        let id = sqlx::query(
            "INSERT INTO attachment (unty_file_no, file_seq, file_name, file_path, size_bytes, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&file.unty_file_no)
        .bind(file_seq)
        .bind(&file.file_name)
        .bind(&file.file_path)
        .bind(file.size_bytes)
        .bind(now_text())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get(id).await?.ok_or_else(|| RepositoryError::not_found("file", id))
    }

    pub async fn list_group(&self, unty_file_no: &str) -> Result<Vec<Attachment>, RepositoryError> {
        let sql = format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachment WHERE unty_file_no = ? ORDER BY file_seq ASC"
        );
        sqlx::query(&sql)
            .bind(unty_file_no)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_attachment)
            .collect()
    }

    pub async fn get(&self, file_id: i64) -> Result<Option<Attachment>, RepositoryError> {
        let sql = format!("SELECT {ATTACHMENT_COLUMNS} FROM attachment WHERE id = ?");
        sqlx::query(&sql)
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(row_to_attachment)
            .transpose()
    }

    /// Removes the row and returns it so the caller can delete the stored file.
    pub async fn delete(&self, file_id: i64) -> Result<Attachment, RepositoryError> {
        let attachment =
            self.get(file_id).await?.ok_or_else(|| RepositoryError::not_found("file", file_id))?;
        sqlx::query("DELETE FROM attachment WHERE id = ?").bind(file_id).execute(&self.pool).await?;
        Ok(attachment)
    }
}

fn row_to_attachment(row: &SqliteRow) -> Result<Attachment, RepositoryError> {
    Ok(Attachment {
        file_id: col(row, "id")?,
        unty_file_no: col(row, "unty_file_no")?,
        file_seq: col(row, "file_seq")?,
        file_name: col(row, "file_name")?,
        file_path: col(row, "file_path")?,
        size_bytes: col(row, "size_bytes")?,
        created_at: timestamp(row, "created_at")?,
    })
}
