use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use groupware_core::domain::customer::{Customer, CustomerDetail, CustomerFilter, CustomerInput};
use groupware_db::SqlCustomerRepository;
use serde::Serialize;
use tracing::info;

use crate::error::{not_found, repository_error, ApiResult, CreatedResult};
use crate::state::AppState;

use super::Message;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerCreated {
    pub message: &'static str,
    pub new_customer_id: i64,
}

fn repo(state: &AppState) -> SqlCustomerRepository {
    SqlCustomerRepository::new(state.db_pool.clone())
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<CustomerFilter>,
) -> ApiResult<Vec<Customer>> {
    repo(&state).list(&filter).await.map(Json).map_err(repository_error)
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<CustomerDetail> {
    repo(&state)
        .get(id)
        .await
        .map_err(repository_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("customer {id} not found")))
}

pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CustomerInput>,
) -> CreatedResult<CustomerCreated> {
    let id = repo(&state).create(&input).await.map_err(repository_error)?;
    info!(
        event_name = "customer.created",
        customer_id = id,
        managers = input.managers.len(),
        "customer created"
    );
    Ok((StatusCode::CREATED, Json(CustomerCreated { message: "customer saved", new_customer_id: id })))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<CustomerInput>,
) -> ApiResult<Message> {
    repo(&state).update(id, &input).await.map_err(repository_error)?;
    info!(event_name = "customer.updated", customer_id = id, "customer updated");
    Ok(Json(Message::new("customer updated")))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Message> {
    repo(&state).delete(id).await.map_err(repository_error)?;
    info!(event_name = "customer.deleted", customer_id = id, "customer deleted");
    Ok(Json(Message::new("customer deleted")))
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        Json,
    };
    use groupware_core::domain::customer::{
        CustomerFields, CustomerFilter, CustomerInput, ManagerFields,
    };

    use super::{create, delete, get, list, update};
    use crate::state::test_support;

    fn input(name: &str, managers: &[&str]) -> CustomerInput {
        CustomerInput {
            customer: CustomerFields { customer_nm: name.to_string(), ..CustomerFields::default() },
            managers: managers
                .iter()
                .map(|manager| ManagerFields { manager_nm: manager.to_string(), ..ManagerFields::default() })
                .collect(),
        }
    }

    #[tokio::test]
    async fn customer_lifecycle_with_managers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_support::state(dir.path()).await;

        let (status, Json(created)) =
            create(State(state.clone()), Json(input("한빛전자", &["김과장", "이대리"])))
                .await
                .expect("create");
        assert_eq!(status, StatusCode::CREATED);
        let id = created.new_customer_id;

        let Json(detail) = get(State(state.clone()), Path(id)).await.expect("get");
        assert_eq!(detail.managers.len(), 2);

        update(State(state.clone()), Path(id), Json(input("한빛전자", &["박부장"])))
            .await
            .expect("update");
        let Json(detail) = get(State(state.clone()), Path(id)).await.expect("get");
        assert_eq!(detail.managers.len(), 1);
        assert_eq!(detail.managers[0].fields.manager_nm, "박부장");

        let Json(found) = list(
            State(state.clone()),
            Query(CustomerFilter { name: Some("한빛".to_string()), ..CustomerFilter::default() }),
        )
        .await
        .expect("list");
        assert_eq!(found.len(), 1);

        delete(State(state.clone()), Path(id)).await.expect("delete");
        let (status, _) = delete(State(state), Path(id)).await.expect_err("already gone");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_support::state(dir.path()).await;
        let (status, _) = create(State(state), Json(input("  ", &[]))).await.expect_err("blank");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
