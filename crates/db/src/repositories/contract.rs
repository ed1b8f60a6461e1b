use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use groupware_core::domain::contract::{
    Contract, ContractDetail, ContractFields, ContractFilter, ContractInput, ContractLine,
    ContractLineInput,
};
use groupware_core::numbering::DocumentKind;

use super::rows::{self, col, contains_pattern, date_text, decimal, now_text, opt_date, timestamp};
use super::RepositoryError;
use crate::DbPool;

const CONTRACT_SELECT: &str = "SELECT k.id, k.contract_no, k.contract_name, k.customer_id,
        k.estimate_id, k.sales_id, k.contract_dt, k.contract_start_dt, k.contract_end_dt,
        k.contract_type, k.tax_type, k.amount, k.tax, k.total_amount, k.pay_terms,
        k.warranty_period, k.delivery_dt, k.memo, k.unty_file_no, k.approval_id, k.created_at,
        c.customer_nm, u.name AS sales_nm
     FROM contract k
     LEFT JOIN customer c ON c.customer_id = k.customer_id
     LEFT JOIN users u ON u.id = k.sales_id";

pub struct SqlContractRepository {
    pool: DbPool,
}

impl SqlContractRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, filter: &ContractFilter) -> Result<Vec<Contract>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(CONTRACT_SELECT);
        query.push(" WHERE 1 = 1");
        if let Some(search) = filter.search.as_deref().filter(|value| !value.trim().is_empty()) {
            let pattern = contains_pattern(search);
            query
                .push(" AND (k.contract_name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR k.contract_no LIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.customer_nm LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(sales_id) = filter.sales_id {
            query.push(" AND k.sales_id = ").push_bind(sales_id);
        }
        if let Some(start) = date_text(filter.start_date) {
            query.push(" AND k.contract_dt >= ").push_bind(start);
        }
        if let Some(end) = date_text(filter.end_date) {
            query.push(" AND k.contract_dt <= ").push_bind(end);
        }
        query.push(" ORDER BY k.created_at DESC, k.id DESC");

        query.build().fetch_all(&self.pool).await?.iter().map(row_to_contract).collect()
    }

    pub async fn get(&self, id: i64) -> Result<Option<ContractDetail>, RepositoryError> {
        let sql = format!("{CONTRACT_SELECT} WHERE k.id = ?");
        let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let contract = row_to_contract(&row)?;

        let products = sqlx::query(
            "SELECT cp.id, cp.product_id, p.name AS product_name, cp.quantity, cp.unit_price,
                    cp.tax_rate, cp.tax_amount, cp.total_price, cp.sales_dt, cp.sales_cycle, cp.memo
             FROM contract_product cp
             LEFT JOIN product p ON p.id = cp.product_id
             WHERE cp.contract_id = ? ORDER BY cp.id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(row_to_line)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ContractDetail { contract, products }))
    }

    /// Issues a `CTR-` number and stores the contract with its product lines.
    pub async fn create(&self, input: &ContractInput) -> Result<(i64, String), RepositoryError> {
        input.validate()?;
        let mut tx = rows::begin_write(&self.pool).await?;
        let now = now_text();
        let contract_no =
            rows::next_document_number(&mut tx, DocumentKind::Contract, "contract", "contract_no")
                .await?;
        let fields = &input.contract;

        let id = sqlx::query(
            "INSERT INTO contract (
                contract_no, contract_name, customer_id, estimate_id, sales_id, contract_dt,
                contract_start_dt, contract_end_dt, contract_type, tax_type, amount, tax,
                total_amount, pay_terms, warranty_period, delivery_dt, memo, unty_file_no,
                created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&contract_no)
        .bind(fields.contract_name.trim())
        .bind(fields.customer_id)
        .bind(fields.estimate_id)
        .bind(fields.sales_id)
        .bind(date_text(fields.contract_dt))
        .bind(date_text(fields.contract_start_dt))
        .bind(date_text(fields.contract_end_dt))
        .bind(&fields.contract_type)
        .bind(&fields.tax_type)
        .bind(fields.amount.to_string())
        .bind(fields.tax.to_string())
        .bind(fields.total_amount.to_string())
        .bind(&fields.pay_terms)
        .bind(&fields.warranty_period)
        .bind(date_text(fields.delivery_dt))
        .bind(&fields.memo)
        .bind(&fields.unty_file_no)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        insert_lines(&mut tx, id, &input.products).await?;
        tx.commit().await?;
        Ok((id, contract_no))
    }

    pub async fn update(&self, id: i64, input: &ContractInput) -> Result<(), RepositoryError> {
        input.validate()?;
        let fields = &input.contract;
        let mut tx = rows::begin_write(&self.pool).await?;

        let updated = sqlx::query(
            "UPDATE contract SET contract_name = ?, customer_id = ?, estimate_id = ?, sales_id = ?,
                contract_dt = ?, contract_start_dt = ?, contract_end_dt = ?, contract_type = ?,
                tax_type = ?, amount = ?, tax = ?, total_amount = ?, pay_terms = ?,
                warranty_period = ?, delivery_dt = ?, memo = ?, unty_file_no = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(fields.contract_name.trim())
        .bind(fields.customer_id)
        .bind(fields.estimate_id)
        .bind(fields.sales_id)
        .bind(date_text(fields.contract_dt))
        .bind(date_text(fields.contract_start_dt))
        .bind(date_text(fields.contract_end_dt))
        .bind(&fields.contract_type)
        .bind(&fields.tax_type)
        .bind(fields.amount.to_string())
        .bind(fields.tax.to_string())
        .bind(fields.total_amount.to_string())
        .bind(&fields.pay_terms)
        .bind(&fields.warranty_period)
        .bind(date_text(fields.delivery_dt))
        .bind(&fields.memo)
        .bind(&fields.unty_file_no)
        .bind(now_text())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::not_found("contract", id));
        }

        sqlx::query("DELETE FROM contract_product WHERE contract_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_lines(&mut tx, id, &input.products).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let deleted =
            sqlx::query("DELETE FROM contract WHERE id = ?").bind(id).execute(&self.pool).await?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::not_found("contract", id));
        }
        Ok(())
    }
}

async fn insert_lines(
    conn: &mut SqliteConnection,
    contract_id: i64,
    lines: &[ContractLineInput],
) -> Result<(), RepositoryError> {
    for line in lines {
        sqlx::query(
            "INSERT INTO contract_product (
                contract_id, product_id, quantity, unit_price, tax_rate, tax_amount, total_price,
                sales_dt, sales_cycle, memo
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(contract_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price.to_string())
        .bind(line.tax_rate.to_string())
        .bind(line.tax_amount.to_string())
        .bind(line.total_price.to_string())
        .bind(date_text(line.sales_dt))
        .bind(&line.sales_cycle)
        .bind(&line.memo)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn row_to_contract(row: &SqliteRow) -> Result<Contract, RepositoryError> {
    Ok(Contract {
        contract_id: col(row, "id")?,
        contract_no: col(row, "contract_no")?,
        fields: ContractFields {
            contract_name: col(row, "contract_name")?,
            customer_id: col(row, "customer_id")?,
            estimate_id: col(row, "estimate_id")?,
            sales_id: col(row, "sales_id")?,
            contract_dt: opt_date(row, "contract_dt")?,
            contract_start_dt: opt_date(row, "contract_start_dt")?,
            contract_end_dt: opt_date(row, "contract_end_dt")?,
            contract_type: col(row, "contract_type")?,
            tax_type: col(row, "tax_type")?,
            amount: decimal(row, "amount")?,
            tax: decimal(row, "tax")?,
            total_amount: decimal(row, "total_amount")?,
            pay_terms: col(row, "pay_terms")?,
            warranty_period: col(row, "warranty_period")?,
            delivery_dt: opt_date(row, "delivery_dt")?,
            memo: col(row, "memo")?,
            unty_file_no: col(row, "unty_file_no")?,
        },
        customer_nm: col(row, "customer_nm")?,
        sales_nm: col(row, "sales_nm")?,
        approval_id: col(row, "approval_id")?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn row_to_line(row: &SqliteRow) -> Result<ContractLine, RepositoryError> {
    Ok(ContractLine {
        line_id: col(row, "id")?,
        product_name: col(row, "product_name")?,
        line: ContractLineInput {
            product_id: col(row, "product_id")?,
            quantity: col(row, "quantity")?,
            unit_price: decimal(row, "unit_price")?,
            tax_rate: decimal(row, "tax_rate")?,
            tax_amount: decimal(row, "tax_amount")?,
            total_price: decimal(row, "total_price")?,
            sales_dt: opt_date(row, "sales_dt")?,
            sales_cycle: col(row, "sales_cycle")?,
            memo: col(row, "memo")?,
        },
    })
}
