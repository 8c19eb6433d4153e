//! Resumable embedding batch.
//!
//! Pages through the catalogue in insertion order, skips records that already
//! have a processed vector, embeds the rest one at a time, and upserts each
//! page as a unit. Every page boundary leaves the store valid, so dropping the
//! future between pages (or capping work with `limit`) needs no rollback.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{is_fatal, EngineError};
use crate::ingest::canonical;
use crate::llm::embeddings::{check_dimension, Embedder};
use crate::models::{ClassificationRecord, EmbeddingRecord, EmbeddingStatus};
use crate::store::catalogue::CatalogueStore;
use crate::store::embeddings::EmbeddingStore;

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub page_size: usize,
    /// Maximum records to attempt in this run; `None` runs to the end.
    pub limit: Option<usize>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            page_size: 16,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub errors: usize,
    pub remaining: usize,
}

/// Embed every catalogue record that has no processed vector yet.
///
/// Per-item embedding failures and per-page store failures are counted and
/// skipped. A dimension mismatch halts the run.
pub async fn run_batch(
    catalogue: &CatalogueStore,
    store: &EmbeddingStore,
    embedder: &dyn Embedder,
    opts: &BatchOptions,
) -> Result<BatchReport> {
    let dimension = embedder.dimension();
    if let Some(stored) = store.stored_dimension() {
        if stored != dimension {
            return Err(EngineError::DimensionMismatch {
                expected: stored,
                actual: dimension,
            }
            .into());
        }
    }

    let page_size = opts.page_size.max(1);
    let budget = opts.limit.unwrap_or(usize::MAX);
    let model_identity = embedder.model_identity();

    let mut report = BatchReport::default();
    let mut attempted = 0usize;
    let mut offset = 0usize;

    while attempted < budget {
        let page = catalogue.page(offset, page_size);
        if page.is_empty() {
            break;
        }
        offset += page.len();

        let ids: Vec<Uuid> = page.iter().map(|r| r.id).collect();
        let done = store.processed_ids(&ids);
        let to_process: Vec<&ClassificationRecord> =
            page.iter().filter(|r| !done.contains(&r.id)).collect();
        if to_process.is_empty() {
            continue;
        }

        let mut buffer = Vec::with_capacity(to_process.len());
        for record in to_process {
            if attempted >= budget {
                break;
            }
            attempted += 1;

            match embed_record(embedder, dimension, record).await {
                Ok(vector) => buffer.push(EmbeddingRecord {
                    record_id: record.id,
                    vector,
                    status: EmbeddingStatus::Processed,
                    model_identity: model_identity.clone(),
                    generated_at: Utc::now(),
                    error: None,
                }),
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(
                        "Embedding failed for {} ({}): {e:#}",
                        record.primary_code,
                        record.id
                    );
                    if let Err(mark_err) =
                        store.mark_failed(record.id, &model_identity, &format!("{e:#}"))
                    {
                        tracing::warn!("Could not record failure for {}: {mark_err:#}", record.id);
                    }
                }
            }
        }

        let page_count = buffer.len();
        match store.upsert(buffer) {
            Ok(n) => report.processed += n,
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => {
                report.errors += page_count;
                tracing::error!("Failed to store {page_count} embeddings at offset {offset}: {e:#}");
            }
        }

        tracing::info!(
            "Embedding batch progress: {} processed, {} errors, {} of {} records scanned",
            report.processed,
            report.errors,
            offset,
            catalogue.len()
        );
    }

    let ids = catalogue.ids();
    report.remaining = ids.len().saturating_sub(store.processed_ids(&ids).len());

    tracing::info!(
        "Embedding batch finished: processed={} errors={} remaining={}",
        report.processed,
        report.errors,
        report.remaining
    );
    Ok(report)
}

async fn embed_record(
    embedder: &dyn Embedder,
    dimension: usize,
    record: &ClassificationRecord,
) -> Result<Vec<f32>> {
    let text = canonical::record_text(record);
    let vector = embedder.embed(&text).await?;
    check_dimension(dimension, &vector)?;
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::hashing::HashingEmbedder;
    use async_trait::async_trait;

    /// Fails on any text containing `poison`.
    struct FlakyEmbedder {
        inner: HashingEmbedder,
        poison: &'static str,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        fn model_identity(&self) -> String {
            "flaky".to_string()
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains(self.poison) {
                anyhow::bail!("inference error");
            }
            Ok(self.inner.embed_text(text))
        }
    }

    fn seeded(dir: &tempfile::TempDir, count: usize) -> (CatalogueStore, EmbeddingStore) {
        let catalogue = CatalogueStore::open_or_create(&dir.path().join("catalogue.json")).unwrap();
        let store = EmbeddingStore::open_or_create(&dir.path().join("embeddings.json")).unwrap();
        let records = (0..count)
            .map(|i| ClassificationRecord {
                id: Uuid::new_v4(),
                primary_code: format!("{:08}", 33_019_000 + i),
                secondary_code: "3301".to_string(),
                commodity_name: format!("Item {i}"),
                description: format!("Essential oil variety {i}"),
                tax_rate: None,
                hierarchy_context: Some("Chapter 33".to_string()),
                sources: Vec::new(),
            })
            .collect();
        catalogue.insert_many(records).unwrap();
        (catalogue, store)
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (catalogue, store) = seeded(&dir, 7);
        let embedder = HashingEmbedder::new(32).unwrap();
        let opts = BatchOptions {
            page_size: 3,
            limit: None,
        };

        let first = run_batch(&catalogue, &store, &embedder, &opts).await.unwrap();
        assert_eq!(first.processed, 7);
        assert_eq!(first.remaining, 0);

        let second = run_batch(&catalogue, &store, &embedder, &opts).await.unwrap();
        assert_eq!(second, BatchReport::default());
    }

    #[tokio::test]
    async fn test_embedding_failure_is_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (catalogue, store) = seeded(&dir, 5);
        let embedder = FlakyEmbedder {
            inner: HashingEmbedder::new(32).unwrap(),
            poison: "variety 2",
        };

        let report = run_batch(&catalogue, &store, &embedder, &BatchOptions::default())
            .await
            .unwrap();
        assert_eq!(report.processed, 4);
        assert_eq!(report.errors, 1);
        assert_eq!(report.remaining, 1);
        assert_eq!(store.status_counts().failed, 1);
    }

    #[tokio::test]
    async fn test_limit_caps_work_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let (catalogue, store) = seeded(&dir, 10);
        let embedder = HashingEmbedder::new(32).unwrap();

        let opts = BatchOptions {
            page_size: 4,
            limit: Some(6),
        };
        let report = run_batch(&catalogue, &store, &embedder, &opts).await.unwrap();
        assert_eq!(report.processed, 6);
        assert_eq!(report.remaining, 4);
    }

    #[tokio::test]
    async fn test_dimension_change_halts_batch() {
        let dir = tempfile::tempdir().unwrap();
        let (catalogue, store) = seeded(&dir, 3);
        let opts = BatchOptions {
            page_size: 2,
            limit: Some(1),
        };
        run_batch(&catalogue, &store, &HashingEmbedder::new(32).unwrap(), &opts)
            .await
            .unwrap();

        let err = run_batch(&catalogue, &store, &HashingEmbedder::new(64).unwrap(), &opts)
            .await
            .unwrap_err();
        assert!(is_fatal(&err));
        assert_eq!(store.status_counts().processed, 1);
    }
}
