use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use groupware_core::domain::contract_approval::{
    ContractApproval, ContractApprovalDetail, ContractApprovalFields, ContractApprovalFilter,
    ContractApprovalInput, ServiceItem, ServiceItemInput,
};
use groupware_core::numbering::DocumentKind;

use super::rows::{
    self, col, contains_pattern, date_text, decimal, now_text, opt_date, opt_decimal, timestamp,
};
use super::RepositoryError;
use crate::DbPool;

const APPROVAL_SELECT: &str = "SELECT a.*, cc.customer_nm AS customer_company,
        ec.customer_nm AS end_customer, u.name AS sales_nm
     FROM contract_approval a
     LEFT JOIN customer cc ON cc.customer_id = a.customer_company_id
     LEFT JOIN customer ec ON ec.customer_id = a.end_customer_id
     LEFT JOIN users u ON u.id = a.sales_id";

pub struct SqlContractApprovalRepository {
    pool: DbPool,
}

impl SqlContractApprovalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filter: &ContractApprovalFilter,
    ) -> Result<Vec<ContractApproval>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(APPROVAL_SELECT);
        query.push(" WHERE 1 = 1");
        let text_filters = [
            ("a.contract_approval_no", filter.contract_approval_no.as_deref()),
            ("cc.customer_nm", filter.customer_company.as_deref()),
            ("ec.customer_nm", filter.end_customer.as_deref()),
        ];
        for (column, value) in text_filters {
            if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
                query.push(format!(" AND {column} LIKE ")).push_bind(contains_pattern(value));
            }
        }
        query.push(" ORDER BY a.created_at DESC, a.id DESC");

        query.build().fetch_all(&self.pool).await?.iter().map(row_to_approval).collect()
    }

    pub async fn get(&self, id: i64) -> Result<Option<ContractApprovalDetail>, RepositoryError> {
        let sql = format!("{APPROVAL_SELECT} WHERE a.id = ?");
        let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let approval = row_to_approval(&row)?;

        let service_items = sqlx::query(
            "SELECT id, service_type, contract_type, service_category, item_name, description,
                    unit, quantity, unit_price, amount
             FROM contract_approval_service WHERE contract_approval_id = ? ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(row_to_service_item)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ContractApprovalDetail { approval, service_items }))
    }

    /// Issues an `ORD-` number and stores the document with its service items.
    pub async fn create(
        &self,
        input: &ContractApprovalInput,
    ) -> Result<(i64, String), RepositoryError> {
        input.validate()?;
        let fields = input.approval.clone().normalized();
        let mut tx = rows::begin_write(&self.pool).await?;
        let now = now_text();
        let number = rows::next_document_number(
            &mut tx,
            DocumentKind::ContractApproval,
            "contract_approval",
            "contract_approval_no",
        )
        .await?;

        let id = bind_fields(
            sqlx::query(
                "INSERT INTO contract_approval (
                    estimate_id, contract_id, version, project_name, customer_company_id,
                    end_customer_id, sales_id, tax_invoice_manager_id, tax_invoice_request_date,
                    contract_start_date, contract_end_date, payment_type, payment_condition,
                    submit_documents, sales_amount, purchase_amount, profit, vendor_company_name,
                    vendor_manager_name, vendor_manager_position, vendor_manager_email,
                    vendor_manager_phone, vendor_order_request_date, vendor_delivery_address,
                    vendor_payment_type, vendor_payment_condition, unty_file_no, special_notes,
                    updated_at, contract_approval_no, created_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                           ?, ?, ?, ?, ?, ?, ?)",
            ),
            &fields,
            &now,
        )
        .bind(&number)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        insert_service_items(&mut tx, id, &input.service_items).await?;
        tx.commit().await?;
        Ok((id, number))
    }

    /// Updates the document and replaces its service items.
    pub async fn update(&self, id: i64, input: &ContractApprovalInput) -> Result<(), RepositoryError> {
        input.validate()?;
        let fields = input.approval.clone().normalized();
        let mut tx = rows::begin_write(&self.pool).await?;

        let updated = bind_fields(
            sqlx::query(
                "UPDATE contract_approval SET
                    estimate_id = ?, contract_id = ?, version = ?, project_name = ?,
                    customer_company_id = ?, end_customer_id = ?, sales_id = ?,
                    tax_invoice_manager_id = ?, tax_invoice_request_date = ?,
                    contract_start_date = ?, contract_end_date = ?, payment_type = ?,
                    payment_condition = ?, submit_documents = ?, sales_amount = ?,
                    purchase_amount = ?, profit = ?, vendor_company_name = ?,
                    vendor_manager_name = ?, vendor_manager_position = ?, vendor_manager_email = ?,
                    vendor_manager_phone = ?, vendor_order_request_date = ?,
                    vendor_delivery_address = ?, vendor_payment_type = ?,
                    vendor_payment_condition = ?, unty_file_no = ?, special_notes = ?,
                    updated_at = ?
                 WHERE id = ?",
            ),
            &fields,
            &now_text(),
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::not_found("contract approval", id));
        }

        sqlx::query("DELETE FROM contract_approval_service WHERE contract_approval_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_service_items(&mut tx, id, &input.service_items).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let deleted = sqlx::query("DELETE FROM contract_approval WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::not_found("contract approval", id));
        }
        Ok(())
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

/// Binds the shared column list used by both insert and update, ending with `updated_at`.
fn bind_fields<'q>(
    query: SqliteQuery<'q>,
    fields: &ContractApprovalFields,
    updated_at: &str,
) -> SqliteQuery<'q> {
    query
        .bind(fields.estimate_id)
        .bind(fields.contract_id)
        .bind(fields.version.clone())
        .bind(fields.project_name.trim().to_string())
        .bind(fields.customer_company_id)
        .bind(fields.end_customer_id)
        .bind(fields.sales_id)
        .bind(fields.tax_invoice_manager_id)
        .bind(date_text(fields.tax_invoice_request_date))
        .bind(date_text(fields.contract_start_date))
        .bind(date_text(fields.contract_end_date))
        .bind(fields.payment_type.clone())
        .bind(fields.payment_condition.clone())
        .bind(fields.submit_documents.clone())
        .bind(fields.sales_amount.to_string())
        .bind(fields.purchase_amount.to_string())
        .bind(fields.profit.map(|profit| profit.to_string()))
        .bind(fields.vendor_company_name.clone())
        .bind(fields.vendor_manager_name.clone())
        .bind(fields.vendor_manager_position.clone())
        .bind(fields.vendor_manager_email.clone())
        .bind(fields.vendor_manager_phone.clone())
        .bind(date_text(fields.vendor_order_request_date))
        .bind(fields.vendor_delivery_address.clone())
        .bind(fields.vendor_payment_type.clone())
        .bind(fields.vendor_payment_condition.clone())
        .bind(fields.unty_file_no.clone())
        .bind(fields.special_notes.clone())
        .bind(updated_at.to_string())
}

async fn insert_service_items(
    conn: &mut SqliteConnection,
    contract_approval_id: i64,
    items: &[ServiceItemInput],
) -> Result<(), RepositoryError> {
    for item in items {
        sqlx::query(
            "INSERT INTO contract_approval_service (
                contract_approval_id, service_type, contract_type, service_category, item_name,
                description, unit, quantity, unit_price, amount
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(contract_approval_id)
        .bind(&item.service_type)
        .bind(&item.contract_type)
        .bind(&item.service_category)
        .bind(item.item_name.trim())
        .bind(&item.description)
        .bind(&item.unit)
        .bind(item.quantity)
        .bind(item.unit_price.to_string())
        .bind(item.amount.to_string())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn row_to_approval(row: &SqliteRow) -> Result<ContractApproval, RepositoryError> {
    let fields = ContractApprovalFields {
        estimate_id: col(row, "estimate_id")?,
        contract_id: col(row, "contract_id")?,
        version: col(row, "version")?,
        project_name: col(row, "project_name")?,
        customer_company_id: col(row, "customer_company_id")?,
        end_customer_id: col(row, "end_customer_id")?,
        sales_id: col(row, "sales_id")?,
        tax_invoice_manager_id: col(row, "tax_invoice_manager_id")?,
        tax_invoice_request_date: opt_date(row, "tax_invoice_request_date")?,
        contract_start_date: opt_date(row, "contract_start_date")?,
        contract_end_date: opt_date(row, "contract_end_date")?,
        payment_type: col(row, "payment_type")?,
        payment_type_other: None,
        payment_condition: col(row, "payment_condition")?,
        submit_documents: col(row, "submit_documents")?,
        sales_amount: decimal(row, "sales_amount")?,
        purchase_amount: decimal(row, "purchase_amount")?,
        profit: opt_decimal(row, "profit")?,
        vendor_company_name: col(row, "vendor_company_name")?,
        vendor_manager_name: col(row, "vendor_manager_name")?,
        vendor_manager_position: col(row, "vendor_manager_position")?,
        vendor_manager_email: col(row, "vendor_manager_email")?,
        vendor_manager_phone: col(row, "vendor_manager_phone")?,
        vendor_order_request_date: opt_date(row, "vendor_order_request_date")?,
        vendor_delivery_address: col(row, "vendor_delivery_address")?,
        vendor_payment_type: col(row, "vendor_payment_type")?,
        vendor_payment_type_other: None,
        vendor_payment_condition: col(row, "vendor_payment_condition")?,
        unty_file_no: col(row, "unty_file_no")?,
        special_notes: col(row, "special_notes")?,
    };

    Ok(ContractApproval {
        id: col(row, "id")?,
        contract_approval_no: col(row, "contract_approval_no")?,
        fields: fields.for_display(),
        customer_company: col(row, "customer_company")?,
        end_customer: col(row, "end_customer")?,
        sales_nm: col(row, "sales_nm")?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn row_to_service_item(row: &SqliteRow) -> Result<ServiceItem, RepositoryError> {
    Ok(ServiceItem {
        id: col(row, "id")?,
        item: ServiceItemInput {
            service_type: col(row, "service_type")?,
            contract_type: col(row, "contract_type")?,
            service_category: col(row, "service_category")?,
            item_name: col(row, "item_name")?,
            description: col(row, "description")?,
            unit: col(row, "unit")?,
            quantity: col(row, "quantity")?,
            unit_price: decimal(row, "unit_price")?,
            amount: decimal(row, "amount")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use groupware_core::domain::contract_approval::{
        ContractApprovalFields, ContractApprovalFilter, ContractApprovalInput, ServiceItemInput,
        PAYMENT_TYPE_OTHER,
    };
    use groupware_core::errors::ErrorClass;

    use super::SqlContractApprovalRepository;
    use crate::repositories::test_support::{insert_customer, insert_estimate, pool};

    fn input(estimate_id: i64, customer: i64, end_customer: i64) -> ContractApprovalInput {
        ContractApprovalInput {
            approval: ContractApprovalFields {
                estimate_id: Some(estimate_id),
                project_name: "HQ firewall refresh".to_string(),
                customer_company_id: Some(customer),
                end_customer_id: Some(end_customer),
                payment_type: Some(PAYMENT_TYPE_OTHER.to_string()),
                payment_type_other: Some("분기납".to_string()),
                vendor_payment_type: Some("월납".to_string()),
                sales_amount: Decimal::new(5_000_000, 0),
                purchase_amount: Decimal::new(3_500_000, 0),
                ..ContractApprovalFields::default()
            },
            service_items: vec![ServiceItemInput {
                item_name: "Annual maintenance".to_string(),
                quantity: 1,
                unit_price: Decimal::new(500_000, 0),
                amount: Decimal::new(500_000, 0),
                ..ServiceItemInput::default()
            }],
        }
    }

    #[tokio::test]
    async fn create_issues_ord_number_and_folds_other_payment_type() {
        let pool = pool().await;
        let acme = insert_customer(&pool, "Acme").await;
        let end = insert_customer(&pool, "Acme Branch").await;
        let estimate = insert_estimate(&pool, acme, "ITS-20240101-001").await;
        let repo = SqlContractApprovalRepository::new(pool.clone());

        let (id, number) = repo.create(&input(estimate, acme, end)).await.expect("create");
        assert!(number.starts_with("ORD-"));
        assert!(number.ends_with("-001"));

        let stored: Option<String> =
            sqlx::query_scalar("SELECT payment_type FROM contract_approval WHERE id = ?")
                .bind(id)
                .fetch_one(&pool)
                .await
                .expect("raw");
        assert_eq!(stored.as_deref(), Some("분기납"));

        let detail = repo.get(id).await.expect("get").expect("exists");
        let fields = &detail.approval.fields;
        assert_eq!(fields.payment_type.as_deref(), Some(PAYMENT_TYPE_OTHER));
        assert_eq!(fields.payment_type_other.as_deref(), Some("분기납"));
        assert_eq!(fields.vendor_payment_type.as_deref(), Some("월납"));
        assert_eq!(fields.profit, Some(Decimal::new(1_500_000, 0)));
        assert_eq!(detail.approval.end_customer.as_deref(), Some("Acme Branch"));
        assert_eq!(detail.service_items.len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_customer_company() {
        let pool = pool().await;
        let acme = insert_customer(&pool, "Acme").await;
        let globex = insert_customer(&pool, "Globex").await;
        let estimate = insert_estimate(&pool, acme, "ITS-20240101-001").await;
        let repo = SqlContractApprovalRepository::new(pool);
        repo.create(&input(estimate, acme, acme)).await.expect("create");
        repo.create(&input(estimate, globex, globex)).await.expect("create");

        let found = repo
            .list(&ContractApprovalFilter {
                customer_company: Some("glob".to_string()),
                ..Default::default()
            })
            .await
            .expect("list");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].customer_company.as_deref(), Some("Globex"));
    }

    #[tokio::test]
    async fn update_replaces_service_items_and_missing_row_is_not_found() {
        let pool = pool().await;
        let acme = insert_customer(&pool, "Acme").await;
        let estimate = insert_estimate(&pool, acme, "ITS-20240101-001").await;
        let repo = SqlContractApprovalRepository::new(pool);
        let (id, _) = repo.create(&input(estimate, acme, acme)).await.expect("create");

        let mut change = input(estimate, acme, acme);
        change.service_items.clear();
        repo.update(id, &change).await.expect("update");
        let detail = repo.get(id).await.expect("get").expect("exists");
        assert!(detail.service_items.is_empty());

        let error = repo.update(999, &change).await.expect_err("missing");
        assert_eq!(error.class(), ErrorClass::NotFound);
    }
}
