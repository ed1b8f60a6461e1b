use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use groupware_core::domain::contract_review::{
    ContractReview, ContractReviewDetail, ContractReviewFilter, ContractReviewInput,
};
use groupware_db::SqlContractReviewRepository;
use serde::Serialize;
use tracing::info;

use crate::error::{not_found, repository_error, ApiResult, CreatedResult};
use crate::state::AppState;

use super::Message;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractReviewCreated {
    pub message: &'static str,
    pub id: i64,
    pub contract_review_no: String,
}

fn repo(state: &AppState) -> SqlContractReviewRepository {
    SqlContractReviewRepository::new(state.db_pool.clone())
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ContractReviewFilter>,
) -> ApiResult<Vec<ContractReview>> {
    repo(&state).list(&filter).await.map(Json).map_err(repository_error)
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ContractReviewDetail> {
    repo(&state)
        .get(id)
        .await
        .map_err(repository_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("contract review {id} not found")))
}

pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<ContractReviewInput>,
) -> CreatedResult<ContractReviewCreated> {
    let (id, contract_review_no) = repo(&state).create(&input).await.map_err(repository_error)?;
    info!(
        event_name = "contract_review.created",
        contract_review_id = id,
        contract_review_no = %contract_review_no,
        route_hops = input.sales_route.len(),
        "contract review created"
    );
    Ok((
        StatusCode::CREATED,
        Json(ContractReviewCreated { message: "contract review saved", id, contract_review_no }),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ContractReviewInput>,
) -> ApiResult<Message> {
    repo(&state).update(id, &input).await.map_err(repository_error)?;
    info!(event_name = "contract_review.updated", contract_review_id = id, "contract review updated");
    Ok(Json(Message::new("contract review updated")))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Message> {
    repo(&state).delete(id).await.map_err(repository_error)?;
    info!(event_name = "contract_review.deleted", contract_review_id = id, "contract review deleted");
    Ok(Json(Message::new("contract review deleted")))
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::{Path, State},
        http::StatusCode,
        Json,
    };
    use groupware_core::domain::contract_review::ContractReviewInput;

    use super::{create, delete, get, update};
    use crate::state::test_support;

    fn input(customer_id: i64) -> ContractReviewInput {
        serde_json::from_value(serde_json::json!({
            "projectName": "Branch VPN rollout",
            "customerCompanyId": customer_id,
            "executeDate": "2024-07-01",
            "contractAmount": "12000000",
            "salesRoute": ["SecuGate", "Acme Networks"],
            "contractDetails": [{"category": "Warranty", "standard": "12 months"}]
        }))
        .expect("input")
    }

    #[tokio::test]
    async fn review_lifecycle_over_handlers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_support::state(dir.path()).await;
        let customer_id = test_support::customer(&state, "Acme").await;

        let (status, Json(created)) =
            create(State(state.clone()), Json(input(customer_id))).await.expect("create");
        assert_eq!(status, StatusCode::CREATED);
        assert!(created.contract_review_no.starts_with("REV-"));

        let Json(detail) = get(State(state.clone()), Path(created.id)).await.expect("get");
        let json = serde_json::to_value(&detail).expect("json");
        assert_eq!(json["customerCompany"], "Acme");
        assert_eq!(json["salesRoute"][0], "SecuGate");
        assert_eq!(json["contractDetails"][0]["standard"], "12 months");

        let mut change = input(customer_id);
        change.sales_route.reverse();
        update(State(state.clone()), Path(created.id), Json(change)).await.expect("update");
        let Json(detail) = get(State(state.clone()), Path(created.id)).await.expect("get");
        assert_eq!(detail.sales_route, ["Acme Networks", "SecuGate"]);

        delete(State(state.clone()), Path(created.id)).await.expect("delete");
        let (status, _) = get(State(state.clone()), Path(created.id)).await.expect_err("gone");
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = delete(State(state), Path(created.id)).await.expect_err("gone");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn project_name_is_required() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_support::state(dir.path()).await;
        let mut blank = input(1);
        blank.review.project_name.clear();

        let (status, _) = create(State(state), Json(blank)).await.expect_err("blank");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
