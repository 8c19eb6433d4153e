use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::classify::{classify, QueryInput, RequestContext, NO_MATCH_MESSAGE};
use crate::models::{ClassifyRequest, ClassifyResponse};
use crate::search::hybrid::MatchOptions;
use crate::state::AppState;

use super::internal_error;

/// POST /api/classify - Suggest classification codes for a product or free text:
///   1. Canonical query text from structured attributes (or collapsed free text)
///   2. Query embedding via the shared model handle
///   3. Hybrid lexical + vector ranking, vector-only if the lexical side is down
///   4. Confidence tiers, and an audit entry for the top candidate
pub async fn classify_product(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, (StatusCode, String)> {
    let input = match (req.attributes, req.text) {
        (Some(attrs), _) => QueryInput::Attributes(attrs),
        (None, Some(text)) if !text.trim().is_empty() => QueryInput::FreeText(text),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                "Either attributes or text is required".to_string(),
            ))
        }
    };

    let defaults = &state.config.matcher;
    let opts = MatchOptions {
        limit: req.limit.unwrap_or(defaults.limit).clamp(1, 50),
        threshold: req.threshold.unwrap_or(defaults.threshold).clamp(0.0, 1.0),
    };
    let ctx = RequestContext {
        source_entity_id: req.source_entity_id,
        created_by: req.created_by,
    };

    let embedder = state.embedder.get().await.map_err(|e| {
        tracing::error!("Embedding model unavailable: {e:#}");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Embedding model unavailable: {e:#}"),
        )
    })?;

    let result = classify(
        &state.matcher,
        embedder.as_ref(),
        &state.audit,
        &input,
        &ctx,
        &opts,
        defaults.max_query_chars,
    )
    .await
    .map_err(|e| internal_error("Classification failed", e))?;

    let candidates = result.views();
    let message = candidates.is_empty().then(|| NO_MATCH_MESSAGE.to_string());

    Ok(Json(ClassifyResponse {
        count: candidates.len(),
        candidates,
        strategy: result.strategy.as_str().to_string(),
        suggestion_id: result.suggestion.map(|s| s.id),
        message,
    }))
}
