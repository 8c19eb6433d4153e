use axum::extract::{Path, State};
use axum::Json;

use crate::chapters::{chapter_counts, chapter_records};
use crate::models::{ChapterCount, ClassificationRecord};
use crate::state::AppState;

/// GET /api/chapters
pub async fn list_chapters(State(state): State<AppState>) -> Json<Vec<ChapterCount>> {
    Json(chapter_counts(&state.catalogue.all()))
}

/// GET /api/chapters/{key}/records
pub async fn chapter_detail(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<Vec<ClassificationRecord>> {
    Json(chapter_records(&state.catalogue.all(), key.trim()))
}
