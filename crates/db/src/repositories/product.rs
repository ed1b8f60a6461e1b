use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite};

use groupware_core::domain::product::{Product, ProductFields, ProductFilter, ProductPage};

use super::rows::{col, contains_pattern, decimal, now_text};
use super::{Page, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str =
    "id, name, vendor, price, fw_throughput, ips_throughput, description, image_path";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<ProductPage, RepositoryError> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {PRODUCT_COLUMNS} FROM product"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let products = query
            .build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_product)
            .collect::<Result<Vec<_>, _>>()?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM product");
        push_filters(&mut count, filter);
        let total_count = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(ProductPage { products, total_count })
    }

    pub async fn get(&self, id: i64) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?");
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(row_to_product)
            .transpose()
    }

    pub async fn create(&self, fields: &ProductFields) -> Result<i64, RepositoryError> {
        fields.validate()?;
        let now = now_text();
        let id = sqlx::query(
            "INSERT INTO product (
                name, vendor, price, fw_throughput, ips_throughput, description, image_path,
                created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(fields.name.trim())
        .bind(fields.vendor.trim())
        .bind(fields.price.to_string())
        .bind(&fields.fw_throughput)
        .bind(&fields.ips_throughput)
        .bind(&fields.description)
        .bind(&fields.image_path)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn update(&self, id: i64, fields: &ProductFields) -> Result<(), RepositoryError> {
        fields.validate()?;
        let updated = sqlx::query(
            "UPDATE product SET name = ?, vendor = ?, price = ?, fw_throughput = ?,
                ips_throughput = ?, description = ?, image_path = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(fields.name.trim())
        .bind(fields.vendor.trim())
        .bind(fields.price.to_string())
        .bind(&fields.fw_throughput)
        .bind(&fields.ips_throughput)
        .bind(&fields.description)
        .bind(&fields.image_path)
        .bind(now_text())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::not_found("product", id));
        }
        Ok(())
    }

    /// Fails with a conflict while an estimate or contract line still uses the product.
    pub async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let deleted =
            sqlx::query("DELETE FROM product WHERE id = ?").bind(id).execute(&self.pool).await?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::not_found("product", id));
        }
        Ok(())
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(name) = filter.name.as_deref().filter(|value| !value.trim().is_empty()) {
        builder.push(" AND name LIKE ").push_bind(contains_pattern(name));
    }
    if let Some(vendor) = filter.vendor.as_deref().filter(|value| !value.trim().is_empty()) {
        builder.push(" AND vendor LIKE ").push_bind(contains_pattern(vendor));
    }
}

fn row_to_product(row: &SqliteRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: col(row, "id")?,
        fields: ProductFields {
            name: col(row, "name")?,
            vendor: col(row, "vendor")?,
            price: decimal(row, "price")?,
            fw_throughput: col(row, "fw_throughput")?,
            ips_throughput: col(row, "ips_throughput")?,
            description: col(row, "description")?,
            image_path: col(row, "image_path")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use groupware_core::domain::product::{ProductFields, ProductFilter};
    use groupware_core::errors::ErrorClass;

    use super::SqlProductRepository;
    use crate::repositories::test_support::pool;
    use crate::repositories::Page;

    fn fields(name: &str, vendor: &str, price: i64) -> ProductFields {
        ProductFields {
            name: name.to_string(),
            vendor: vendor.to_string(),
            price: Decimal::new(price, 0),
            fw_throughput: Some("10Gbps".to_string()),
            ..ProductFields::default()
        }
    }

    #[tokio::test]
    async fn list_pages_and_reports_total_count() {
        let repo = SqlProductRepository::new(pool().await);
        for index in 0..5 {
            repo.create(&fields(&format!("NGFW-{index}"), "Acme", 1_000)).await.expect("create");
        }
        repo.create(&fields("Switch", "Initech", 300)).await.expect("create");

        let page = repo
            .list(&ProductFilter { vendor: Some("acme".to_string()), ..Default::default() }, Page::new(Some(2), Some(3)))
            .await
            .expect("list");
        assert_eq!(page.total_count, 5);
        assert_eq!(page.products.len(), 2);
    }

    #[tokio::test]
    async fn price_round_trips_as_decimal_text() {
        let repo = SqlProductRepository::new(pool().await);
        let mut product = fields("IPS", "Acme", 0);
        product.price = Decimal::new(123_450, 2);
        let id = repo.create(&product).await.expect("create");

        let stored = repo.get(id).await.expect("get").expect("exists");
        assert_eq!(stored.fields.price, Decimal::new(123_450, 2));
    }

    #[tokio::test]
    async fn update_of_missing_product_is_not_found() {
        let repo = SqlProductRepository::new(pool().await);
        let error = repo.update(9, &fields("X", "Y", 1)).await.expect_err("missing");
        assert_eq!(error.class(), ErrorClass::NotFound);
    }
}
