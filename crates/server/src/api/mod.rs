//! HTTP surface. `/login` and `/health` are public; everything else sits
//! behind the bearer-token middleware.

pub mod approval;
pub mod contract_approvals;
pub mod contract_reviews;
pub mod contracts;
pub mod customers;
pub mod documents;
pub mod estimates;
pub mod files;
pub mod login;
pub mod permissions;
pub mod products;
pub mod timeline;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::header,
    middleware,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_auth;
use crate::health;
use crate::state::AppState;

/// Upper bound for a single request body, uploads included.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/approval/request", post(approval::submit))
        .route("/approval/process", post(approval::process))
        .route("/approval/approve", post(approval::approve))
        .route("/approval/reject", post(approval::reject))
        .route("/approval/cancel/{id}", post(approval::cancel))
        .route("/approval/updateStatus/{id}", post(approval::update_status))
        .route("/approval/list", get(approval::list))
        .route("/approval/{id}", get(approval::detail))
        .route("/users", get(users::list).post(users::create))
        .route("/users/{id}", get(users::get).put(users::update).delete(users::delete))
        .route("/customers", get(customers::list).post(customers::create))
        .route(
            "/customers/{id}",
            get(customers::get).put(customers::update).delete(customers::delete),
        )
        .route("/api/products", get(products::list).post(products::create))
        .route(
            "/api/products/{id}",
            get(products::get).put(products::update).delete(products::delete),
        )
        .route("/api/estimates", get(estimates::list).post(estimates::create))
        .route(
            "/api/estimates/{id}",
            get(estimates::get).put(estimates::update).delete(estimates::delete),
        )
        .route("/contracts", get(contracts::list).post(contracts::create))
        .route(
            "/contracts/{id}",
            get(contracts::get).put(contracts::update).delete(contracts::delete),
        )
        .route(
            "/contractApproval",
            get(contract_approvals::list).post(contract_approvals::create),
        )
        .route(
            "/contractApproval/{id}",
            get(contract_approvals::get)
                .put(contract_approvals::update)
                .delete(contract_approvals::delete),
        )
        .route(
            "/contractReviews",
            get(contract_reviews::list).post(contract_reviews::create),
        )
        .route(
            "/contractReviews/{id}",
            get(contract_reviews::get)
                .put(contract_reviews::update)
                .delete(contract_reviews::delete),
        )
        .route("/timeline", post(timeline::create))
        .route("/timeline/{customer_id}", get(timeline::list))
        .route("/permissions/screens", get(permissions::screens))
        .route("/upload", post(files::upload))
        // GET takes an attachment group id, DELETE a file id.
        .route("/files/{id}", get(files::list_group).delete(files::delete))
        .route("/download/file/{id}", get(files::download))
        .route("/documents/{doc_type}/{doc_id}/pdf", get(documents::render))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let health = health::router(state.db_pool.clone(), state.upload_dir.clone());

    Router::new()
        .route("/login", post(login::login))
        .merge(protected)
        .with_state(state)
        .merge(health)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([header::CONTENT_DISPOSITION]),
        )
}
