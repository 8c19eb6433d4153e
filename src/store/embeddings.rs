use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{EmbeddingRecord, EmbeddingStatus};

use super::write_atomic;

/// Count of embedding rows per status.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub processed: usize,
    pub failed: usize,
}

/// `record_id → EmbeddingRecord`, persisted as JSON. At most one row per record.
pub struct EmbeddingStore {
    entries: RwLock<HashMap<Uuid, EmbeddingRecord>>,
    persist_path: PathBuf,
}

impl EmbeddingStore {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entries: HashMap<Uuid, EmbeddingRecord> = if path.exists() {
            let data = std::fs::read_to_string(path).context("Failed to read embedding store")?;
            let rows: Vec<EmbeddingRecord> =
                serde_json::from_str(&data).context("Failed to parse embedding store")?;
            rows.into_iter().map(|r| (r.record_id, r)).collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path: path.to_path_buf(),
        })
    }

    /// Subset of `ids` that already have a processed vector.
    pub fn processed_ids(&self, ids: &[Uuid]) -> HashSet<Uuid> {
        let entries = self.entries.read();
        ids.iter()
            .filter(|id| {
                entries
                    .get(id)
                    .is_some_and(|e| e.status == EmbeddingStatus::Processed)
            })
            .copied()
            .collect()
    }

    /// Dimension shared by every processed vector, if any are stored.
    pub fn stored_dimension(&self) -> Option<usize> {
        self.entries
            .read()
            .values()
            .find(|e| e.status == EmbeddingStatus::Processed)
            .map(|e| e.vector.len())
    }

    /// Insert or overwrite rows keyed by `record_id`.
    ///
    /// All-or-nothing: a dimension mismatch or a failed write leaves the
    /// store exactly as it was.
    pub fn upsert(&self, rows: Vec<EmbeddingRecord>) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut entries = self.entries.write();
        let mut expected = entries
            .values()
            .find(|e| e.status == EmbeddingStatus::Processed)
            .map(|e| e.vector.len());

        for row in rows.iter().filter(|r| r.status == EmbeddingStatus::Processed) {
            match expected {
                Some(dim) if dim != row.vector.len() => {
                    return Err(EngineError::DimensionMismatch {
                        expected: dim,
                        actual: row.vector.len(),
                    }
                    .into());
                }
                Some(_) => {}
                None => expected = Some(row.vector.len()),
            }
        }

        let mut next = entries.clone();
        let count = rows.len();
        for row in rows {
            next.insert(row.record_id, row);
        }
        persist(&self.persist_path, &next)?;
        *entries = next;
        Ok(count)
    }

    /// Record a failed generation. Never downgrades an existing processed row.
    pub fn mark_failed(&self, record_id: Uuid, model_identity: &str, error: &str) -> Result<()> {
        let mut entries = self.entries.write();
        if entries
            .get(&record_id)
            .is_some_and(|e| e.status == EmbeddingStatus::Processed)
        {
            return Ok(());
        }

        let mut next = entries.clone();
        next.insert(
            record_id,
            EmbeddingRecord {
                record_id,
                vector: Vec::new(),
                status: EmbeddingStatus::Failed,
                model_identity: model_identity.to_string(),
                generated_at: Utc::now(),
                error: Some(error.to_string()),
            },
        );
        persist(&self.persist_path, &next)?;
        *entries = next;
        Ok(())
    }

    /// Processed `(record_id, vector)` pairs for similarity scans.
    pub fn processed_vectors(&self) -> Vec<(Uuid, Vec<f32>)> {
        self.entries
            .read()
            .values()
            .filter(|e| e.status == EmbeddingStatus::Processed)
            .map(|e| (e.record_id, e.vector.clone()))
            .collect()
    }

    pub fn get(&self, record_id: &Uuid) -> Option<EmbeddingRecord> {
        self.entries.read().get(record_id).cloned()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let entries = self.entries.read();
        let mut counts = StatusCounts::default();
        for e in entries.values() {
            match e.status {
                EmbeddingStatus::Pending => counts.pending += 1,
                EmbeddingStatus::Processed => counts.processed += 1,
                EmbeddingStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Drop every row. Only used by a full catalogue reload.
    pub fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write();
        persist(&self.persist_path, &HashMap::new())?;
        entries.clear();
        Ok(())
    }
}

fn persist(path: &Path, entries: &HashMap<Uuid, EmbeddingRecord>) -> Result<()> {
    let rows: Vec<&EmbeddingRecord> = entries.values().collect();
    let data = serde_json::to_string(&rows)?;
    write_atomic(path, &data).context("Failed to persist embedding store")
}
