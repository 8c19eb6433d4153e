use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::models::ClassificationRecord;
use crate::state::AppState;

use super::internal_error;

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Wipe the catalogue and every embedding, then load.
    #[default]
    Replace,
    /// Keep existing records; add new code pairs and tag known ones.
    Merge,
}

#[derive(Debug, Deserialize)]
pub struct IngestParams {
    pub source: Option<String>,
    #[serde(default)]
    pub mode: IngestMode,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub records: usize,
    pub skipped_duplicates: usize,
    pub retagged: usize,
}

/// POST /api/catalogue/ingest?source=&mode=replace|merge - Load a raw text corpus.
pub async fn ingest(
    State(state): State<AppState>,
    Query(params): Query<IngestParams>,
    body: String,
) -> Result<Json<IngestResponse>, (StatusCode, String)> {
    if body.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Corpus text is required".to_string()));
    }
    let source = params
        .source
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "upload".to_string());

    let summary = match params.mode {
        IngestMode::Replace => state.reload_catalogue(&body, &source).await,
        IngestMode::Merge => state.merge_catalogue(&body, &source).await,
    }
    .map_err(|e| internal_error("Catalogue ingest failed", e))?;

    Ok(Json(IngestResponse {
        records: summary.inserted,
        skipped_duplicates: summary.skipped_duplicates,
        retagged: summary.retagged,
    }))
}

/// GET /api/catalogue/{code}
pub async fn get_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<ClassificationRecord>>, (StatusCode, String)> {
    let records = state.catalogue.find_by_code(code.trim());
    if records.is_empty() {
        return Err((StatusCode::NOT_FOUND, format!("No record with code {code}")));
    }
    Ok(Json(records))
}
