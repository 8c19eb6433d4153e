use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::models::BatchRequest;
use crate::pipeline::{run_batch, BatchOptions, BatchReport};
use crate::state::AppState;
use crate::store::embeddings::StatusCounts;

use super::internal_error;

#[derive(Debug, Serialize)]
pub struct EmbeddingStatusResponse {
    pub total_records: usize,
    pub remaining: usize,
    pub counts: StatusCounts,
    pub stored_dimension: Option<usize>,
}

/// POST /api/embeddings/batch - Idempotent; call until `remaining == 0`.
/// The JSON body is optional, so a bare POST runs to completion.
pub async fn trigger_batch(
    State(state): State<AppState>,
    body: Option<Json<BatchRequest>>,
) -> Result<Json<BatchReport>, (StatusCode, String)> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let Ok(_guard) = state.batch_lock.try_lock() else {
        return Err((
            StatusCode::CONFLICT,
            "An embedding batch or catalogue reload is already running".to_string(),
        ));
    };

    let embedder = state.embedder.get().await.map_err(|e| {
        tracing::error!("Embedding model unavailable: {e:#}");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Embedding model unavailable: {e:#}"),
        )
    })?;

    let opts = BatchOptions {
        page_size: state.config.batch.page_size,
        limit: req.limit,
    };
    let report = run_batch(&state.catalogue, &state.embeddings, embedder.as_ref(), &opts)
        .await
        .map_err(|e| internal_error("Embedding batch halted", e))?;

    Ok(Json(report))
}

/// GET /api/embeddings/status
pub async fn embedding_status(State(state): State<AppState>) -> Json<EmbeddingStatusResponse> {
    let ids = state.catalogue.ids();
    let processed = state.embeddings.processed_ids(&ids).len();
    Json(EmbeddingStatusResponse {
        total_records: ids.len(),
        remaining: ids.len().saturating_sub(processed),
        counts: state.embeddings.status_counts(),
        stored_dimension: state.embeddings.stored_dimension(),
    })
}
