//! Column decoding shared by the SQL repositories. Timestamps are RFC 3339
//! text, dates are `YYYY-MM-DD` text and money is decimal text.

use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, Transaction};

use groupware_core::numbering::{DocumentKind, DocumentNumber};

use super::RepositoryError;
use crate::DbPool;

pub(crate) fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

pub(crate) fn timestamp(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, RepositoryError> {
    let raw: String = col(row, name)?;
    parse_timestamp(name, &raw)
}

pub(crate) fn opt_timestamp(
    row: &SqliteRow,
    name: &str,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    let raw: Option<String> = col(row, name)?;
    raw.map(|value| parse_timestamp(name, &value)).transpose()
}

fn parse_timestamp(name: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

pub(crate) fn opt_date(row: &SqliteRow, name: &str) -> Result<Option<NaiveDate>, RepositoryError> {
    let raw: Option<String> = col(row, name)?;
    raw.filter(|value| !value.is_empty())
        .map(|value| {
            NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
        })
        .transpose()
}

pub(crate) fn decimal(row: &SqliteRow, name: &str) -> Result<Decimal, RepositoryError> {
    let raw: String = col(row, name)?;
    Decimal::from_str(&raw).map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

pub(crate) fn opt_decimal(row: &SqliteRow, name: &str) -> Result<Option<Decimal>, RepositoryError> {
    let raw: Option<String> = col(row, name)?;
    raw.map(|value| {
        Decimal::from_str(&value).map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
    })
    .transpose()
}

/// Parses a stored enum column through its `FromStr`.
pub(crate) fn parsed<T: FromStr>(row: &SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T::Err: std::fmt::Display,
{
    let raw: String = col(row, name)?;
    raw.parse().map_err(|e: T::Err| RepositoryError::Decode(format!("{name}: {e}")))
}

pub(crate) fn now_text() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn date_text(date: Option<NaiveDate>) -> Option<String> {
    date.map(|value| value.format("%Y-%m-%d").to_string())
}

pub(crate) fn contains_pattern(value: &str) -> String {
    format!("%{}%", value.trim())
}

/// Write transaction that takes the database write lock up front, so two
/// writers never read the same counter and then collide on upgrade.
pub(crate) async fn begin_write(pool: &DbPool) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

/// Next day-sequenced number for `kind`, read inside the caller's transaction.
/// Takes the larger of the row count and the highest issued sequence so a
/// deleted row never causes a number to be handed out twice.
pub(crate) async fn next_document_number(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    table: &str,
    column: &str,
) -> Result<String, RepositoryError> {
    let day = Local::now().date_naive();
    let prefix = kind.day_prefix(day);
    let sql = format!(
        "SELECT COUNT(*) AS issued, COALESCE(MAX(CAST(SUBSTR({column}, ?) AS INTEGER)), 0) AS max_seq
         FROM {table} WHERE {column} LIKE ?"
    );
    let row = sqlx::query(&sql)
        .bind(prefix.chars().count() as i64 + 1)
        .bind(format!("{prefix}%"))
        .fetch_one(&mut *conn)
        .await?;

    let issued: i64 = col(&row, "issued")?;
    let max_seq: i64 = col(&row, "max_seq")?;
    Ok(DocumentNumber::next(kind, day, issued.max(max_seq)).to_string())
}

pub(crate) async fn row_exists(
    conn: &mut SqliteConnection,
    table: &str,
    id_column: &str,
    id: i64,
) -> Result<bool, RepositoryError> {
    let sql = format!("SELECT 1 FROM {table} WHERE {id_column} = ?");
    let found: Option<i64> = sqlx::query_scalar(&sql).bind(id).fetch_optional(&mut *conn).await?;
    Ok(found.is_some())
}
