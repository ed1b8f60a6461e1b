use sqlx::sqlite::SqliteRow;

use groupware_core::domain::timeline::{TimelineEntry, TimelineInput};

use super::rows::{self, col, date_text, now_text, opt_decimal};
use super::RepositoryError;
use crate::DbPool;

const TIMELINE_SELECT: &str = "SELECT t.timeline_id, t.customer_id, t.category, t.event_date,
        t.description, t.person, t.amount, c.customer_nm AS company
     FROM timeline t
     JOIN customer c ON c.customer_id = t.customer_id";

pub struct SqlTimelineRepository {
    pool: DbPool,
}

impl SqlTimelineRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Events for one customer, newest first. Unknown customers are not found
    /// rather than an empty list.
    pub async fn list_for_customer(
        &self,
        customer_id: i64,
    ) -> Result<Vec<TimelineEntry>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        if !rows::row_exists(&mut conn, "customer", "customer_id", customer_id).await? {
            return Err(RepositoryError::not_found("customer", customer_id));
        }

        let sql = format!(
            "{TIMELINE_SELECT} WHERE t.customer_id = ? ORDER BY t.event_date DESC, t.timeline_id DESC"
        );
        sqlx::query(&sql)
            .bind(customer_id)
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(row_to_entry)
            .collect()
    }

    pub async fn create(&self, input: &TimelineInput) -> Result<TimelineEntry, RepositoryError> {
        let (customer_id, event_date) = input.validate()?;
        let mut tx = rows::begin_write(&self.pool).await?;

        let id = sqlx::query(
            "INSERT INTO timeline (
                customer_id, category, event_date, description, person, amount, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(customer_id)
        .bind(input.category.trim())
        .bind(date_text(Some(event_date)))
        .bind(input.description.trim())
        .bind(input.person.as_deref().map(str::trim).filter(|person| !person.is_empty()))
        .bind(input.amount.map(|amount| amount.to_string()))
        .bind(now_text())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let sql = format!("{TIMELINE_SELECT} WHERE t.timeline_id = ?");
        let row = sqlx::query(&sql).bind(id).fetch_one(&mut *tx).await?;
        let entry = row_to_entry(&row)?;
        tx.commit().await?;
        Ok(entry)
    }
}

fn row_to_entry(row: &SqliteRow) -> Result<TimelineEntry, RepositoryError> {
    let event_date = rows::opt_date(row, "event_date")?
        .ok_or_else(|| RepositoryError::Decode("event_date: empty".to_string()))?;
    Ok(TimelineEntry {
        timeline_id: col(row, "timeline_id")?,
        customer_id: col(row, "customer_id")?,
        category: col(row, "category")?,
        event_date,
        description: col(row, "description")?,
        person: col(row, "person")?,
        amount: opt_decimal(row, "amount")?,
        company: col(row, "company")?,
    })
}
