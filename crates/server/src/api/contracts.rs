use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use groupware_core::domain::contract::{Contract, ContractDetail, ContractFilter, ContractInput};
use groupware_db::SqlContractRepository;
use serde::Serialize;
use tracing::info;

use crate::error::{not_found, repository_error, ApiResult, CreatedResult};
use crate::state::AppState;

use super::Message;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCreated {
    pub message: &'static str,
    pub contract_id: i64,
    pub contract_no: String,
}

fn repo(state: &AppState) -> SqlContractRepository {
    SqlContractRepository::new(state.db_pool.clone())
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ContractFilter>,
) -> ApiResult<Vec<Contract>> {
    repo(&state).list(&filter).await.map(Json).map_err(repository_error)
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<ContractDetail> {
    repo(&state)
        .get(id)
        .await
        .map_err(repository_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("contract {id} not found")))
}

pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<ContractInput>,
) -> CreatedResult<ContractCreated> {
    let (contract_id, contract_no) =
        repo(&state).create(&input).await.map_err(repository_error)?;
    info!(
        event_name = "contract.created",
        contract_id,
        contract_no = %contract_no,
        lines = input.products.len(),
        "contract created"
    );
    Ok((
        StatusCode::CREATED,
        Json(ContractCreated { message: "contract saved", contract_id, contract_no }),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ContractInput>,
) -> ApiResult<Message> {
    repo(&state).update(id, &input).await.map_err(repository_error)?;
    info!(event_name = "contract.updated", contract_id = id, "contract updated");
    Ok(Json(Message::new("contract updated")))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Message> {
    repo(&state).delete(id).await.map_err(repository_error)?;
    info!(event_name = "contract.deleted", contract_id = id, "contract deleted");
    Ok(Json(Message::new("contract deleted")))
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        Json,
    };
    use chrono::NaiveDate;
    use groupware_core::domain::contract::{
        ContractFields, ContractFilter, ContractInput, ContractLineInput,
    };
    use rust_decimal::Decimal;

    use super::{create, delete, get, list, update};
    use crate::state::test_support;

    fn input(customer_id: i64, name: &str, lines: Vec<ContractLineInput>) -> ContractInput {
        ContractInput {
            contract: ContractFields {
                contract_name: name.to_string(),
                customer_id,
                contract_start_dt: NaiveDate::from_ymd_opt(2024, 4, 1),
                contract_end_dt: NaiveDate::from_ymd_opt(2025, 3, 31),
                amount: Decimal::from(1_000_000),
                tax: Decimal::from(100_000),
                total_amount: Decimal::from(1_100_000),
                ..ContractFields::default()
            },
            products: lines,
        }
    }

    #[tokio::test]
    async fn contract_lifecycle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_support::state(dir.path()).await;
        let customer_id = test_support::customer(&state, "Acme").await;
        let product_id = test_support::product(&state, "NGFW-100", "1000000").await;
        let line = ContractLineInput {
            product_id,
            quantity: 1,
            unit_price: Decimal::from(1_000_000),
            total_price: Decimal::from(1_000_000),
            ..ContractLineInput::default()
        };

        let (status, Json(created)) =
            create(State(state.clone()), Json(input(customer_id, "Annual support", vec![line])))
                .await
                .expect("create");
        assert_eq!(status, StatusCode::CREATED);
        assert!(created.contract_no.starts_with("CTR-"));

        update(
            State(state.clone()),
            Path(created.contract_id),
            Json(input(customer_id, "Annual support 2024", vec![])),
        )
        .await
        .expect("update");
        let Json(detail) = get(State(state.clone()), Path(created.contract_id)).await.expect("get");
        assert_eq!(detail.contract.fields.contract_name, "Annual support 2024");
        assert_eq!(detail.contract.contract_no, created.contract_no);
        assert!(detail.products.is_empty());

        let Json(found) = list(
            State(state.clone()),
            Query(ContractFilter { search: Some("support 2024".to_string()), ..ContractFilter::default() }),
        )
        .await
        .expect("list");
        assert_eq!(found.len(), 1);

        delete(State(state.clone()), Path(created.contract_id)).await.expect("delete");
        let (status, _) = get(State(state), Path(created.contract_id)).await.expect_err("gone");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn end_before_start_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_support::state(dir.path()).await;
        let customer_id = test_support::customer(&state, "Acme").await;
        let mut body = input(customer_id, "Backwards", vec![]);
        body.contract.contract_end_dt = NaiveDate::from_ymd_opt(2024, 1, 1);

        let (status, Json(error)) = create(State(state), Json(body)).await.expect_err("invalid");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error.error.contains("contractEndDt"));
    }
}
