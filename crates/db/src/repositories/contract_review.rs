use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use groupware_core::domain::contract_review::{
    ContractDetail, ContractDetailInput, ContractReview, ContractReviewDetail,
    ContractReviewFields, ContractReviewFilter, ContractReviewInput,
};
use groupware_core::numbering::DocumentKind;

use super::rows::{self, col, contains_pattern, date_text, now_text, opt_date, opt_decimal, timestamp};
use super::RepositoryError;
use crate::DbPool;

const REVIEW_SELECT: &str = "SELECT r.*, e.quote_id AS estimate_no,
        cc.customer_nm AS customer_company, ec.customer_nm AS end_customer
     FROM contract_review r
     LEFT JOIN estimate e ON e.id = r.estimate_id
     LEFT JOIN customer cc ON cc.customer_id = r.customer_company_id
     LEFT JOIN customer ec ON ec.customer_id = r.end_customer_id";

pub struct SqlContractReviewRepository {
    pool: DbPool,
}

impl SqlContractReviewRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filter: &ContractReviewFilter,
    ) -> Result<Vec<ContractReview>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(REVIEW_SELECT);
        query.push(" WHERE 1 = 1");
        let text_filters = [
            ("r.contract_review_no", filter.contract_review_no.as_deref()),
            ("r.project_name", filter.project_name.as_deref()),
            ("cc.customer_nm", filter.customer_company.as_deref()),
        ];
        for (column, value) in text_filters {
            if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
                query.push(format!(" AND {column} LIKE ")).push_bind(contains_pattern(value));
            }
        }
        query.push(" ORDER BY r.created_at DESC, r.id DESC");

        query.build().fetch_all(&self.pool).await?.iter().map(row_to_review).collect()
    }

    pub async fn get(&self, id: i64) -> Result<Option<ContractReviewDetail>, RepositoryError> {
        let sql = format!("{REVIEW_SELECT} WHERE r.id = ?");
        let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let review = row_to_review(&row)?;

        let sales_route = sqlx::query_scalar(
            "SELECT route_text FROM contract_sales_route
             WHERE contract_review_id = ? ORDER BY route_order ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let contract_details = sqlx::query(
            "SELECT id, category, standard, detail FROM contract_detail
             WHERE contract_review_id = ? ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(row_to_detail)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ContractReviewDetail { review, sales_route, contract_details }))
    }

    /// Issues a `REV-` number and stores the review with its sales route and
    /// contract terms.
    pub async fn create(&self, input: &ContractReviewInput) -> Result<(i64, String), RepositoryError> {
        input.validate()?;
        let mut tx = rows::begin_write(&self.pool).await?;
        let now = now_text();
        let number = rows::next_document_number(
            &mut tx,
            DocumentKind::ContractReview,
            "contract_review",
            "contract_review_no",
        )
        .await?;

        let id = bind_fields(
            sqlx::query(
                "INSERT INTO contract_review (
                    project_name, estimate_id, execute_date, customer_company_id,
                    end_customer_id, opinion, contract_amount, unty_file_no, updated_at,
                    contract_review_no, created_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            ),
            &input.review,
            &now,
        )
        .bind(&number)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        insert_children(&mut tx, id, input).await?;
        tx.commit().await?;
        Ok((id, number))
    }

    /// Updates the review and replaces its sales route and contract terms.
    pub async fn update(&self, id: i64, input: &ContractReviewInput) -> Result<(), RepositoryError> {
        input.validate()?;
        let mut tx = rows::begin_write(&self.pool).await?;

        let updated = bind_fields(
            sqlx::query(
                "UPDATE contract_review SET
                    project_name = ?, estimate_id = ?, execute_date = ?, customer_company_id = ?,
                    end_customer_id = ?, opinion = ?, contract_amount = ?, unty_file_no = ?,
                    updated_at = ?
                 WHERE id = ?",
            ),
            &input.review,
            &now_text(),
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::not_found("contract review", id));
        }

        for table in ["contract_sales_route", "contract_detail"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE contract_review_id = ?"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        insert_children(&mut tx, id, input).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let deleted = sqlx::query("DELETE FROM contract_review WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::not_found("contract review", id));
        }
        Ok(())
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_fields<'q>(
    query: SqliteQuery<'q>,
    fields: &ContractReviewFields,
    updated_at: &str,
) -> SqliteQuery<'q> {
    query
        .bind(fields.project_name.trim().to_string())
        .bind(fields.estimate_id)
        .bind(date_text(fields.execute_date))
        .bind(fields.customer_company_id)
        .bind(fields.end_customer_id)
        .bind(fields.opinion.clone())
        .bind(fields.contract_amount.map(|amount| amount.to_string()))
        .bind(fields.unty_file_no.clone())
        .bind(updated_at.to_string())
}

async fn insert_children(
    conn: &mut SqliteConnection,
    contract_review_id: i64,
    input: &ContractReviewInput,
) -> Result<(), RepositoryError> {
    for (order, hop) in input.sales_route.iter().enumerate() {
        sqlx::query(
            "INSERT INTO contract_sales_route (contract_review_id, route_order, route_text)
             VALUES (?, ?, ?)",
        )
        .bind(contract_review_id)
        .bind(order as i64 + 1)
        .bind(hop.trim())
        .execute(&mut *conn)
        .await?;
    }
    for detail in &input.contract_details {
        sqlx::query(
            "INSERT INTO contract_detail (contract_review_id, category, standard, detail)
             VALUES (?, ?, ?, ?)",
        )
        .bind(contract_review_id)
        .bind(&detail.category)
        .bind(&detail.standard)
        .bind(&detail.detail)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn row_to_review(row: &SqliteRow) -> Result<ContractReview, RepositoryError> {
    Ok(ContractReview {
        id: col(row, "id")?,
        contract_review_no: col(row, "contract_review_no")?,
        fields: ContractReviewFields {
            project_name: col(row, "project_name")?,
            estimate_id: col(row, "estimate_id")?,
            execute_date: opt_date(row, "execute_date")?,
            customer_company_id: col(row, "customer_company_id")?,
            end_customer_id: col(row, "end_customer_id")?,
            opinion: col(row, "opinion")?,
            contract_amount: opt_decimal(row, "contract_amount")?,
            unty_file_no: col(row, "unty_file_no")?,
        },
        estimate_no: col(row, "estimate_no")?,
        customer_company: col(row, "customer_company")?,
        end_customer: col(row, "end_customer")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn row_to_detail(row: &SqliteRow) -> Result<ContractDetail, RepositoryError> {
    Ok(ContractDetail {
        id: col(row, "id")?,
        detail: ContractDetailInput {
            category: col(row, "category")?,
            standard: col(row, "standard")?,
            detail: col(row, "detail")?,
        },
    })
}
