use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{SuggestionLogEntry, SuggestionStatus};
use crate::state::AppState;

use super::internal_error;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

fn default_list_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: SuggestionStatus,
}

/// GET /api/suggestions - Most recent first
pub async fn list_suggestions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Vec<SuggestionLogEntry>> {
    Json(state.audit.list(params.limit.min(1_000)))
}

/// PATCH /api/suggestions/{id} - Record the human decision on a suggestion.
/// The product catalogue persists the final code on its own records.
pub async fn update_suggestion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<SuggestionLogEntry>, (StatusCode, String)> {
    if update.status == SuggestionStatus::Suggested {
        return Err((
            StatusCode::BAD_REQUEST,
            "Status must be accepted or overridden".to_string(),
        ));
    }

    match state.audit.set_status(id, update.status) {
        Ok(Some(entry)) => Ok(Json(entry)),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Suggestion not found".to_string())),
        Err(e) => Err(internal_error("Failed to update suggestion", e)),
    }
}
