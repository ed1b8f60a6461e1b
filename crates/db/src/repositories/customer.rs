use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use groupware_core::domain::customer::{
    Customer, CustomerDetail, CustomerFields, CustomerFilter, CustomerInput, CustomerManager,
    ManagerFields,
};

use super::rows::{self, col, contains_pattern, now_text, timestamp};
use super::RepositoryError;
use crate::DbPool;

const CUSTOMER_COLUMNS: &str = "c.customer_id, c.customer_nm, c.customer_type, c.biz_num, c.mng_nm,
     c.tel_no, c.address1, c.address2, c.address3, c.comment, c.engineer_id, c.sales_id,
     c.unty_file_no, c.created_at, c.updated_at, u.name AS sales_nm";

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer c LEFT JOIN users u ON u.id = c.sales_id WHERE 1 = 1"
        ));
        if let Some(name) = filter.name.as_deref().filter(|name| !name.trim().is_empty()) {
            query.push(" AND c.customer_nm LIKE ").push_bind(contains_pattern(name));
        }
        if let Some(sales_id) = filter.sales_id {
            query.push(" AND c.sales_id = ").push_bind(sales_id);
        }
        query.push(" ORDER BY c.customer_id DESC");

        query.build().fetch_all(&self.pool).await?.iter().map(row_to_customer).collect()
    }

    pub async fn get(&self, customer_id: i64) -> Result<Option<CustomerDetail>, RepositoryError> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer c LEFT JOIN users u ON u.id = c.sales_id
             WHERE c.customer_id = ?"
        );
        let Some(row) = sqlx::query(&sql).bind(customer_id).fetch_optional(&self.pool).await?
        else {
            return Ok(None);
        };
        let customer = row_to_customer(&row)?;

        let managers = sqlx::query(
            "SELECT customer_id, manager_seq, manager_nm, depart_nm, position, email, tel_no, is_primary
             FROM customer_manager WHERE customer_id = ? ORDER BY manager_seq ASC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(row_to_manager)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(CustomerDetail { customer, managers }))
    }

    /// Inserts the customer and its managers in one transaction.
    pub async fn create(&self, input: &CustomerInput) -> Result<i64, RepositoryError> {
        input.validate()?;
        let now = now_text();
        let fields = &input.customer;
        let mut tx = rows::begin_write(&self.pool).await?;

        let customer_id = sqlx::query(
            "INSERT INTO customer (
                customer_nm, customer_type, biz_num, mng_nm, tel_no, address1, address2,
                address3, comment, engineer_id, sales_id, unty_file_no, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(fields.customer_nm.trim())
        .bind(&fields.customer_type)
        .bind(&fields.biz_num)
        .bind(&fields.mng_nm)
        .bind(&fields.tel_no)
        .bind(&fields.address1)
        .bind(&fields.address2)
        .bind(&fields.address3)
        .bind(&fields.comment)
        .bind(fields.engineer_id)
        .bind(fields.sales_id)
        .bind(&fields.unty_file_no)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        insert_managers(&mut tx, customer_id, &input.managers).await?;
        tx.commit().await?;
        Ok(customer_id)
    }

    /// Updates the customer row and replaces its manager list.
    pub async fn update(&self, customer_id: i64, input: &CustomerInput) -> Result<(), RepositoryError> {
        input.validate()?;
        let fields = &input.customer;
        let mut tx = rows::begin_write(&self.pool).await?;

        let updated = sqlx::query(
            "UPDATE customer SET customer_nm = ?, customer_type = ?, biz_num = ?, mng_nm = ?,
                tel_no = ?, address1 = ?, address2 = ?, address3 = ?, comment = ?,
                engineer_id = ?, sales_id = ?, unty_file_no = ?, updated_at = ?
             WHERE customer_id = ?",
        )
        .bind(fields.customer_nm.trim())
        .bind(&fields.customer_type)
        .bind(&fields.biz_num)
        .bind(&fields.mng_nm)
        .bind(&fields.tel_no)
        .bind(&fields.address1)
        .bind(&fields.address2)
        .bind(&fields.address3)
        .bind(&fields.comment)
        .bind(fields.engineer_id)
        .bind(fields.sales_id)
        .bind(&fields.unty_file_no)
        .bind(now_text())
        .bind(customer_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::not_found("customer", customer_id));
        }

        sqlx::query("DELETE FROM customer_manager WHERE customer_id = ?")
            .bind(customer_id)
            .execute(&mut *tx)
            .await?;
        insert_managers(&mut tx, customer_id, &input.managers).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, customer_id: i64) -> Result<(), RepositoryError> {
        let deleted = sqlx::query("DELETE FROM customer WHERE customer_id = ?")
            .bind(customer_id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::not_found("customer", customer_id));
        }
        Ok(())
    }
}

async fn insert_managers(
    conn: &mut SqliteConnection,
    customer_id: i64,
    managers: &[ManagerFields],
) -> Result<(), RepositoryError> {
    for (index, manager) in managers.iter().enumerate() {
        sqlx::query(
            "INSERT INTO customer_manager (
                customer_id, manager_seq, manager_nm, depart_nm, position, email, tel_no, is_primary
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(customer_id)
        .bind(index as i64 + 1)
        .bind(manager.manager_nm.trim())
        .bind(&manager.depart_nm)
        .bind(&manager.position)
        .bind(&manager.email)
        .bind(&manager.tel_no)
        .bind(manager.primary)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn row_to_customer(row: &SqliteRow) -> Result<Customer, RepositoryError> {
    Ok(Customer {
        customer_id: col(row, "customer_id")?,
        fields: CustomerFields {
            customer_nm: col(row, "customer_nm")?,
            customer_type: col(row, "customer_type")?,
            biz_num: col(row, "biz_num")?,
            mng_nm: col(row, "mng_nm")?,
            tel_no: col(row, "tel_no")?,
            address1: col(row, "address1")?,
            address2: col(row, "address2")?,
            address3: col(row, "address3")?,
            comment: col(row, "comment")?,
            engineer_id: col(row, "engineer_id")?,
            sales_id: col(row, "sales_id")?,
            unty_file_no: col(row, "unty_file_no")?,
        },
        sales_nm: col(row, "sales_nm")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn row_to_manager(row: &SqliteRow) -> Result<CustomerManager, RepositoryError> {
    Ok(CustomerManager {
        customer_id: col(row, "customer_id")?,
        manager_seq: col(row, "manager_seq")?,
        fields: ManagerFields {
            manager_nm: col(row, "manager_nm")?,
            depart_nm: col(row, "depart_nm")?,
            position: col(row, "position")?,
            email: col(row, "email")?,
            tel_no: col(row, "tel_no")?,
            primary: col(row, "is_primary")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use groupware_core::domain::customer::{
        CustomerFields, CustomerFilter, CustomerInput, ManagerFields,
    };
    use groupware_core::errors::ErrorClass;

    use super::SqlCustomerRepository;
    use crate::repositories::test_support::{insert_user, pool};

    fn manager(name: &str, primary: bool) -> ManagerFields {
        ManagerFields { manager_nm: name.to_string(), primary, ..ManagerFields::default() }
    }

    fn input(name: &str, sales_id: Option<i64>, managers: Vec<ManagerFields>) -> CustomerInput {
        CustomerInput {
            customer: CustomerFields {
                customer_nm: name.to_string(),
                sales_id,
                ..CustomerFields::default()
            },
            managers,
        }
    }

    #[tokio::test]
    async fn create_stores_customer_with_ordered_managers() {
        let pool = pool().await;
        let sales = insert_user(&pool, "sales", "USER").await;
        let repo = SqlCustomerRepository::new(pool);

        let id = repo
            .create(&input("한빛소프트", Some(sales), vec![manager("Lee", true), manager("Choi", false)]))
            .await
            .expect("create");

        let detail = repo.get(id).await.expect("get").expect("exists");
        assert_eq!(detail.customer.fields.customer_nm, "한빛소프트");
        assert_eq!(detail.customer.sales_nm.as_deref(), Some("SALES"));
        let seqs: Vec<i64> = detail.managers.iter().map(|m| m.manager_seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert!(detail.managers[0].fields.primary);
    }

    #[tokio::test]
    async fn update_replaces_managers() {
        let repo = SqlCustomerRepository::new(pool().await);
        let id = repo
            .create(&input("Acme", None, vec![manager("Lee", true), manager("Choi", false)]))
            .await
            .expect("create");

        repo.update(id, &input("Acme Corp", None, vec![manager("Kang", true)])).await.expect("update");

        let detail = repo.get(id).await.expect("get").expect("exists");
        assert_eq!(detail.customer.fields.customer_nm, "Acme Corp");
        assert_eq!(detail.managers.len(), 1);
        assert_eq!(detail.managers[0].fields.manager_nm, "Kang");
    }

    #[tokio::test]
    async fn list_filters_by_name_and_sales_user() {
        let pool = pool().await;
        let sales = insert_user(&pool, "sales", "USER").await;
        let repo = SqlCustomerRepository::new(pool);
        repo.create(&input("Acme", Some(sales), vec![])).await.expect("create");
        repo.create(&input("Globex", None, vec![])).await.expect("create");

        let by_name = repo
            .list(&CustomerFilter { name: Some("cm".to_string()), ..Default::default() })
            .await
            .expect("list");
        assert_eq!(by_name.len(), 1);

        let by_sales = repo
            .list(&CustomerFilter { sales_id: Some(sales), ..Default::default() })
            .await
            .expect("list");
        assert_eq!(by_sales[0].fields.customer_nm, "Acme");
    }

    #[tokio::test]
    async fn blank_name_and_missing_rows_are_reported() {
        let repo = SqlCustomerRepository::new(pool().await);
        let error = repo.create(&input("  ", None, vec![])).await.expect_err("blank");
        assert_eq!(error.class(), ErrorClass::BadRequest);

        let error = repo.delete(404).await.expect_err("missing");
        assert_eq!(error.class(), ErrorClass::NotFound);
        assert!(repo.get(404).await.expect("get").is_none());
    }
}
