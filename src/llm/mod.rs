//! Embedding models and the process-wide embedder handle.

pub mod embeddings;
pub mod hashing;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::EmbeddingConfig;
use embeddings::{check_dimension, Embedder, HttpEmbedder};
use hashing::HashingEmbedder;

const WARM_UP_TEXT: &str = "warm-up: natural essential oil";

/// Lazily initialized, memoized embedder shared by ingestion and matching.
///
/// Model start-up is paid once per process on first use. A failed start-up
/// leaves the handle empty so the next call retries.
pub struct EmbedderHandle {
    config: EmbeddingConfig,
    client: reqwest::Client,
    cell: OnceCell<Arc<dyn Embedder>>,
}

impl EmbedderHandle {
    pub fn new(config: EmbeddingConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            cell: OnceCell::new(),
        }
    }

    /// Handle around an already-built embedder, e.g. a fake in tests.
    pub fn preloaded(embedder: Arc<dyn Embedder>) -> Self {
        let config = EmbeddingConfig {
            provider: "preloaded".to_string(),
            model: embedder.model_identity(),
            dimension: embedder.dimension(),
            ..EmbeddingConfig::default()
        };
        Self {
            config,
            client: reqwest::Client::new(),
            cell: OnceCell::new_with(Some(embedder)),
        }
    }

    pub async fn get(&self) -> Result<Arc<dyn Embedder>> {
        let embedder = self
            .cell
            .get_or_try_init(|| async { self.initialize().await })
            .await?;
        Ok(Arc::clone(embedder))
    }

    async fn initialize(&self) -> Result<Arc<dyn Embedder>> {
        tracing::info!(
            "Loading embedding model {} via {} (dim {})",
            self.config.model,
            self.config.provider,
            self.config.dimension
        );

        let embedder: Arc<dyn Embedder> = match self.config.provider.as_str() {
            "hashing" => Arc::new(HashingEmbedder::new(self.config.dimension)?),
            _ => Arc::new(HttpEmbedder::new(self.client.clone(), self.config.clone())?),
        };

        // Verifies the model is reachable and emits the configured dimension.
        let probe = embedder
            .embed(WARM_UP_TEXT)
            .await
            .context("Embedding model warm-up failed")?;
        check_dimension(embedder.dimension(), &probe)?;

        tracing::info!("Embedding model ready: {}", embedder.model_identity());
        Ok(embedder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hashing_handle_initializes_once() {
        let config = EmbeddingConfig {
            provider: "hashing".to_string(),
            dimension: 32,
            ..EmbeddingConfig::default()
        };
        let handle = EmbedderHandle::new(config, reqwest::Client::new());
        let first = handle.get().await.unwrap();
        let second = handle.get().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.dimension(), 32);
    }

    #[tokio::test]
    async fn test_preloaded_handle_returns_given_embedder() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(8).unwrap());
        let handle = EmbedderHandle::preloaded(Arc::clone(&embedder));
        let got = handle.get().await.unwrap();
        assert!(Arc::ptr_eq(&embedder, &got));
    }
}
