use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use groupware_core::domain::approval::ApprovalStatus;
use groupware_core::domain::estimate::{
    Estimate, EstimateDetail, EstimateFields, EstimateFilter, EstimateInput, EstimateLine,
    EstimateLineInput,
};
use groupware_core::numbering::DocumentKind;

use super::rows::{
    self, col, contains_pattern, date_text, decimal, now_text, opt_date, opt_decimal, timestamp,
};
use super::RepositoryError;
use crate::DbPool;

const ESTIMATE_SELECT: &str = "SELECT e.id, e.quote_id, e.quote_title, e.customer_id, e.sales_id,
        e.valid_until, e.delivery_condition, e.payment_condition, e.warranty_period, e.remarks,
        e.opinion, e.memo, e.quote_amount, e.total_price_before_vat, e.vat,
        e.total_price_with_vat, e.unty_file_no, e.created_at,
        c.customer_nm, u.name AS sales_nm,
        (SELECT r.status FROM approval_request r
          WHERE r.doc_type = 'ESTIMATE' AND r.doc_id = e.id
          ORDER BY r.id DESC LIMIT 1) AS approval_status
     FROM estimate e
     LEFT JOIN customer c ON c.customer_id = e.customer_id
     LEFT JOIN users u ON u.id = e.sales_id";

pub struct SqlEstimateRepository {
    pool: DbPool,
}

impl SqlEstimateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Filters on customer, title, quote number, sales user and the status of
    /// the latest approval raised for each estimate.
    pub async fn list(&self, filter: &EstimateFilter) -> Result<Vec<Estimate>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT * FROM ({ESTIMATE_SELECT}) AS listed WHERE 1 = 1"
        ));
        let text_filters = [
            ("customer_nm", filter.customer_name.as_deref()),
            ("quote_title", filter.title.as_deref()),
            ("quote_id", filter.quote_no.as_deref()),
            ("sales_nm", filter.sales_name.as_deref()),
        ];
        for (column, value) in text_filters {
            if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
                query.push(format!(" AND {column} LIKE ")).push_bind(contains_pattern(value));
            }
        }
        if let Some(status) = filter.status {
            query.push(" AND approval_status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created_at DESC, id DESC");

        query.build().fetch_all(&self.pool).await?.iter().map(row_to_estimate).collect()
    }

    pub async fn get(&self, id: i64) -> Result<Option<EstimateDetail>, RepositoryError> {
        let sql = format!("{ESTIMATE_SELECT} WHERE e.id = ?");
        let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let estimate = row_to_estimate(&row)?;

        let products = sqlx::query(
            "SELECT ep.id, ep.product_id, p.name AS product_name, p.vendor, ep.quantity,
                    ep.unit_price, ep.discount_rate, ep.total_price, ep.final_price
             FROM estimate_product ep
             LEFT JOIN product p ON p.id = ep.product_id
             WHERE ep.estimate_id = ? ORDER BY ep.id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(row_to_line)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(EstimateDetail { estimate, products }))
    }

    /// Issues an `ITS-` number and stores the estimate with its lines.
    pub async fn create(&self, input: &EstimateInput) -> Result<(i64, String), RepositoryError> {
        input.validate()?;
        let mut tx = rows::begin_write(&self.pool).await?;
        let now = now_text();
        let quote_id =
            rows::next_document_number(&mut tx, DocumentKind::Estimate, "estimate", "quote_id")
                .await?;
        let fields = &input.estimate;

        let id = sqlx::query(
            "INSERT INTO estimate (
                quote_id, quote_title, customer_id, sales_id, valid_until, delivery_condition,
                payment_condition, warranty_period, remarks, opinion, memo, quote_amount,
                total_price_before_vat, vat, total_price_with_vat, unty_file_no,
                created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&quote_id)
        .bind(fields.quote_title.trim())
        .bind(fields.customer_id)
        .bind(fields.sales_id)
        .bind(date_text(fields.valid_until))
        .bind(&fields.delivery_condition)
        .bind(&fields.payment_condition)
        .bind(&fields.warranty_period)
        .bind(&fields.remarks)
        .bind(&fields.opinion)
        .bind(&fields.memo)
        .bind(fields.quote_amount.map(|amount| amount.to_string()))
        .bind(fields.total_price_before_vat.to_string())
        .bind(fields.vat.to_string())
        .bind(fields.total_price_with_vat.to_string())
        .bind(&fields.unty_file_no)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        insert_lines(&mut tx, id, &input.products).await?;
        tx.commit().await?;
        Ok((id, quote_id))
    }

    /// Updates the header and replaces the product lines. The quote number is kept.
    pub async fn update(&self, id: i64, input: &EstimateInput) -> Result<(), RepositoryError> {
        input.validate()?;
        let fields = &input.estimate;
        let mut tx = rows::begin_write(&self.pool).await?;

        let updated = sqlx::query(
            "UPDATE estimate SET quote_title = ?, customer_id = ?, sales_id = ?, valid_until = ?,
                delivery_condition = ?, payment_condition = ?, warranty_period = ?, remarks = ?,
                opinion = ?, memo = ?, quote_amount = ?, total_price_before_vat = ?, vat = ?,
                total_price_with_vat = ?, unty_file_no = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(fields.quote_title.trim())
        .bind(fields.customer_id)
        .bind(fields.sales_id)
        .bind(date_text(fields.valid_until))
        .bind(&fields.delivery_condition)
        .bind(&fields.payment_condition)
        .bind(&fields.warranty_period)
        .bind(&fields.remarks)
        .bind(&fields.opinion)
        .bind(&fields.memo)
        .bind(fields.quote_amount.map(|amount| amount.to_string()))
        .bind(fields.total_price_before_vat.to_string())
        .bind(fields.vat.to_string())
        .bind(fields.total_price_with_vat.to_string())
        .bind(&fields.unty_file_no)
        .bind(now_text())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::not_found("estimate", id));
        }

        sqlx::query("DELETE FROM estimate_product WHERE estimate_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_lines(&mut tx, id, &input.products).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let deleted =
            sqlx::query("DELETE FROM estimate WHERE id = ?").bind(id).execute(&self.pool).await?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::not_found("estimate", id));
        }
        Ok(())
    }
}

async fn insert_lines(
    conn: &mut SqliteConnection,
    estimate_id: i64,
    lines: &[EstimateLineInput],
) -> Result<(), RepositoryError> {
    for line in lines {
        let (total_price, final_price) = line.priced();
        sqlx::query(
            "INSERT INTO estimate_product (
                estimate_id, product_id, quantity, unit_price, discount_rate, total_price, final_price
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(estimate_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price.to_string())
        .bind(line.discount_rate.to_string())
        .bind(total_price.to_string())
        .bind(final_price.to_string())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn row_to_estimate(row: &SqliteRow) -> Result<Estimate, RepositoryError> {
    let approval_status: Option<String> = col(row, "approval_status")?;
    let approval_status = approval_status
        .map(|status| {
            status
                .parse::<ApprovalStatus>()
                .map_err(|e| RepositoryError::Decode(format!("approval_status: {e}")))
        })
        .transpose()?;

    Ok(Estimate {
        estimate_id: col(row, "id")?,
        quote_id: col(row, "quote_id")?,
        fields: EstimateFields {
            quote_title: col(row, "quote_title")?,
            customer_id: col(row, "customer_id")?,
            sales_id: col(row, "sales_id")?,
            valid_until: opt_date(row, "valid_until")?,
            delivery_condition: col(row, "delivery_condition")?,
            payment_condition: col(row, "payment_condition")?,
            warranty_period: col(row, "warranty_period")?,
            remarks: col(row, "remarks")?,
            opinion: col(row, "opinion")?,
            memo: col(row, "memo")?,
            quote_amount: opt_decimal(row, "quote_amount")?,
            total_price_before_vat: decimal(row, "total_price_before_vat")?,
            vat: decimal(row, "vat")?,
            total_price_with_vat: decimal(row, "total_price_with_vat")?,
            unty_file_no: col(row, "unty_file_no")?,
        },
        customer_nm: col(row, "customer_nm")?,
        sales_nm: col(row, "sales_nm")?,
        approval_status,
        created_at: timestamp(row, "created_at")?,
    })
}

fn row_to_line(row: &SqliteRow) -> Result<EstimateLine, RepositoryError> {
    Ok(EstimateLine {
        line_id: col(row, "id")?,
        product_id: col(row, "product_id")?,
        product_name: col(row, "product_name")?,
        vendor: col(row, "vendor")?,
        quantity: col(row, "quantity")?,
        unit_price: decimal(row, "unit_price")?,
        discount_rate: decimal(row, "discount_rate")?,
        total_price: decimal(row, "total_price")?,
        final_price: decimal(row, "final_price")?,
    })
}
