use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::ClassificationRecord;

use super::write_atomic;

#[derive(Default, Clone)]
struct Inner {
    /// Insertion order is the stable paging key.
    records: Vec<ClassificationRecord>,
    by_id: HashMap<Uuid, usize>,
    by_key: HashMap<(String, String), usize>,
}

impl Inner {
    fn from_records(records: Vec<ClassificationRecord>) -> Self {
        let mut inner = Self::default();
        for record in records {
            inner.push(record);
        }
        inner
    }

    /// Returns false when the code pair already exists.
    fn push(&mut self, record: ClassificationRecord) -> bool {
        let key = record.code_key();
        if self.by_key.contains_key(&key) {
            return false;
        }
        self.by_key.insert(key, self.records.len());
        self.by_id.insert(record.id, self.records.len());
        self.records.push(record);
        true
    }
}

/// Outcome of a bulk insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    pub inserted: usize,
    pub skipped_duplicates: usize,
    /// Existing records that gained a provenance tag during a merge.
    pub retagged: usize,
}

/// Catalogue of classification records, persisted as JSON.
pub struct CatalogueStore {
    inner: RwLock<Inner>,
    persist_path: PathBuf,
}

impl CatalogueStore {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let records: Vec<ClassificationRecord> = if path.exists() {
            let data = std::fs::read_to_string(path).context("Failed to read catalogue")?;
            serde_json::from_str(&data).context("Failed to parse catalogue")?
        } else {
            Vec::new()
        };

        Ok(Self {
            inner: RwLock::new(Inner::from_records(records)),
            persist_path: path.to_path_buf(),
        })
    }

    /// Insert records; a duplicate `(primary_code, secondary_code)` is a no-op.
    pub fn insert_many(&self, records: Vec<ClassificationRecord>) -> Result<InsertSummary> {
        let mut inner = self.inner.write();
        let mut next = inner.clone();
        let mut summary = InsertSummary::default();
        for record in records {
            if next.push(record) {
                summary.inserted += 1;
            } else {
                summary.skipped_duplicates += 1;
            }
        }
        // Memory only changes once the file does.
        self.persist(&next.records)?;
        *inner = next;
        Ok(summary)
    }

    /// Wipe the catalogue and load `records` in its place.
    pub fn replace_all(&self, records: Vec<ClassificationRecord>) -> Result<InsertSummary> {
        let mut fresh = Inner::default();
        let mut summary = InsertSummary::default();
        for record in records {
            if fresh.push(record) {
                summary.inserted += 1;
            } else {
                summary.skipped_duplicates += 1;
            }
        }

        let mut inner = self.inner.write();
        self.persist(&fresh.records)?;
        *inner = fresh;
        Ok(summary)
    }

    /// Add records without wiping. A record whose code pair already exists
    /// keeps its id (and so its embedding) and gains `tag` as a source.
    pub fn merge(&self, records: Vec<ClassificationRecord>, tag: &str) -> Result<InsertSummary> {
        let mut inner = self.inner.write();
        let mut next = inner.clone();
        let mut summary = InsertSummary::default();
        for mut record in records {
            match next.by_key.get(&record.code_key()).copied() {
                Some(idx) => {
                    if append_source(&mut next.records[idx], tag) {
                        summary.retagged += 1;
                    } else {
                        summary.skipped_duplicates += 1;
                    }
                }
                None => {
                    append_source(&mut record, tag);
                    next.push(record);
                    summary.inserted += 1;
                }
            }
        }
        self.persist(&next.records)?;
        *inner = next;
        Ok(summary)
    }

    /// One page of records in insertion order.
    pub fn page(&self, offset: usize, limit: usize) -> Vec<ClassificationRecord> {
        let inner = self.inner.read();
        inner
            .records
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &Uuid) -> Option<ClassificationRecord> {
        let inner = self.inner.read();
        inner.by_id.get(id).map(|&idx| inner.records[idx].clone())
    }

    pub fn find_by_code(&self, primary_code: &str) -> Vec<ClassificationRecord> {
        self.inner
            .read()
            .records
            .iter()
            .filter(|r| r.primary_code == primary_code)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<ClassificationRecord> {
        self.inner.read().records.clone()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.inner.read().records.iter().map(|r| r.id).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, records: &[ClassificationRecord]) -> Result<()> {
        let data = serde_json::to_string(records)?;
        write_atomic(&self.persist_path, &data).context("Failed to persist catalogue")
    }
}

/// Provenance tags are the only in-place change a record allows.
fn append_source(record: &mut ClassificationRecord, tag: &str) -> bool {
    if record.sources.iter().any(|s| s == tag) {
        return false;
    }
    record.sources.push(tag.to_string());
    true
}
