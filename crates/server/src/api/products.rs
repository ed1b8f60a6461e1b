use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use groupware_core::domain::product::{Product, ProductFields, ProductFilter, ProductPage};
use groupware_db::{Page, SqlProductRepository};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{not_found, repository_error, ApiResult, CreatedResult};
use crate::state::AppState;

use super::Message;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub name: Option<String>,
    pub vendor: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreated {
    pub message: &'static str,
    pub product_id: i64,
}

fn repo(state: &AppState) -> SqlProductRepository {
    SqlProductRepository::new(state.db_pool.clone())
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<ProductPage> {
    let filter = ProductFilter { name: query.name, vendor: query.vendor };
    let page = Page::new(query.page, query.per_page);
    repo(&state).list(&filter, page).await.map(Json).map_err(repository_error)
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Product> {
    repo(&state)
        .get(id)
        .await
        .map_err(repository_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("product {id} not found")))
}

pub async fn create(
    State(state): State<AppState>,
    Json(fields): Json<ProductFields>,
) -> CreatedResult<ProductCreated> {
    let id = repo(&state).create(&fields).await.map_err(repository_error)?;
    info!(event_name = "product.created", product_id = id, vendor = %fields.vendor, "product created");
    Ok((StatusCode::CREATED, Json(ProductCreated { message: "product created", product_id: id })))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(fields): Json<ProductFields>,
) -> ApiResult<Message> {
    repo(&state).update(id, &fields).await.map_err(repository_error)?;
    info!(event_name = "product.updated", product_id = id, "product updated");
    Ok(Json(Message::new("product updated")))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Message> {
    repo(&state).delete(id).await.map_err(repository_error)?;
    info!(event_name = "product.deleted", product_id = id, "product deleted");
    Ok(Json(Message::new("product deleted")))
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        Json,
    };
    use groupware_core::domain::product::ProductFields;
    use rust_decimal::Decimal;

    use super::{create, get, list, update, ProductQuery};
    use crate::state::test_support;

    fn fields(name: &str, vendor: &str, price: i64) -> ProductFields {
        ProductFields {
            name: name.to_string(),
            vendor: vendor.to_string(),
            price: Decimal::from(price),
            ..ProductFields::default()
        }
    }

    #[tokio::test]
    async fn list_reports_total_count_across_pages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_support::state(dir.path()).await;
        for (name, vendor) in [("NGFW-100", "Secui"), ("NGFW-500", "Secui"), ("UTM-10", "Ahnlab")] {
            create(State(state.clone()), Json(fields(name, vendor, 1_000_000))).await.expect("create");
        }

        let Json(page) = list(
            State(state),
            Query(ProductQuery {
                vendor: Some("Secui".to_string()),
                page: Some(1),
                per_page: Some(1),
                ..ProductQuery::default()
            }),
        )
        .await
        .expect("list");
        assert_eq!(page.total_count, 2);
        assert_eq!(page.products.len(), 1);
    }

    #[tokio::test]
    async fn update_changes_price_and_missing_product_is_404() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_support::state(dir.path()).await;
        let (_, Json(created)) =
            create(State(state.clone()), Json(fields("NGFW-100", "Secui", 100))).await.expect("create");

        update(State(state.clone()), Path(created.product_id), Json(fields("NGFW-100", "Secui", 250)))
            .await
            .expect("update");
        let Json(product) = get(State(state.clone()), Path(created.product_id)).await.expect("get");
        assert_eq!(product.fields.price, Decimal::from(250));

        let (status, _) =
            update(State(state), Path(9_999), Json(fields("x", "y", 1))).await.expect_err("missing");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
