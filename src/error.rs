//! Fatal engine errors.
//!
//! Per-item failures are counted and skipped by their callers; the variants
//! here halt ingestion or matching outright.

/// Configuration errors that must never be recovered from silently.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(
        "embedding dimension mismatch: expected {expected}, got {actual}; \
         re-run ingestion (wipe embeddings) after changing the embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },
}

/// True when `err` carries an `EngineError` anywhere in its chain.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.downcast_ref::<EngineError>().is_some())
}
