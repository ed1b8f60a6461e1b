use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use groupware_db::{SqlContractRepository, SqlEstimateRepository};
use serde::Deserialize;
use tracing::info;

use crate::error::{not_found, pdf_error, repository_error, ApiFailure};
use crate::pdf::{DocumentType, PdfResult, RenderOptions};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentQuery {
    pub include_logo: Option<bool>,
    pub include_signature: Option<bool>,
}

impl DocumentQuery {
    fn options(&self) -> RenderOptions {
        let defaults = RenderOptions::default();
        RenderOptions {
            include_logo: self.include_logo.unwrap_or(defaults.include_logo),
            include_signature: self.include_signature.unwrap_or(defaults.include_signature),
        }
    }
}

/// Renders an estimate or contract as PDF, or as HTML when no converter is available.
pub async fn render(
    State(state): State<AppState>,
    Path((doc_type, doc_id)): Path<(String, i64)>,
    Query(query): Query<DocumentQuery>,
) -> Result<Response, ApiFailure> {
    let doc_type: DocumentType = doc_type.parse().map_err(pdf_error)?;
    let options = query.options();

    let rendered = match doc_type {
        DocumentType::Estimate => {
            let estimate = SqlEstimateRepository::new(state.db_pool.clone())
                .get(doc_id)
                .await
                .map_err(repository_error)?
                .ok_or_else(|| not_found(format!("estimate {doc_id} not found")))?;
            state.documents.render(doc_type, &estimate, options).await
        }
        DocumentType::Contract => {
            let contract = SqlContractRepository::new(state.db_pool.clone())
                .get(doc_id)
                .await
                .map_err(repository_error)?
                .ok_or_else(|| not_found(format!("contract {doc_id} not found")))?;
            state.documents.render(doc_type, &contract, options).await
        }
    }
    .map_err(pdf_error)?;

    info!(
        event_name = "document.rendered",
        doc_type = ?doc_type,
        doc_id,
        format = match rendered {
            PdfResult::Pdf(_) => "pdf",
            PdfResult::Html(_) => "html",
        },
        "document rendered"
    );
    Ok(rendered.into_response(&doc_type.file_name(doc_id)))
}
