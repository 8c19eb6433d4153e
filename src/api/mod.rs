//! Axum HTTP handlers.

pub mod catalogue;
pub mod chapters;
pub mod classify;
pub mod embeddings;
pub mod suggestions;

use axum::http::StatusCode;

use crate::error::is_fatal;

/// Map an engine error to a response. Fatal configuration errors say so.
pub(crate) fn internal_error(context: &str, e: anyhow::Error) -> (StatusCode, String) {
    if is_fatal(&e) {
        tracing::error!("{context}: fatal configuration error: {e:#}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{context}: configuration error: {e:#}"),
        );
    }
    tracing::error!("{context}: {e:#}");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{context}: {e:#}"))
}
