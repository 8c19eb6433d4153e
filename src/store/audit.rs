use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::{SuggestionLogEntry, SuggestionStatus};

use super::write_atomic;

/// Append-only JSONL log of match suggestions.
pub struct SuggestionLog {
    entries: Mutex<Vec<SuggestionLogEntry>>,
    path: PathBuf,
}

impl SuggestionLog {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries = Vec::new();
        if path.exists() {
            let data = std::fs::read_to_string(path).context("Failed to read suggestion log")?;
            for (line_no, line) in data.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<SuggestionLogEntry>(line) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => tracing::warn!("Skipping corrupt suggestion log line {}: {e}", line_no + 1),
                }
            }
        }

        Ok(Self {
            entries: Mutex::new(entries),
            path: path.to_path_buf(),
        })
    }

    pub fn append(&self, entry: SuggestionLogEntry) -> Result<()> {
        let mut entries = self.entries.lock();
        let line = serde_json::to_string(&entry)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("Failed to open suggestion log")?;
        writeln!(file, "{line}").context("Failed to append suggestion")?;
        entries.push(entry);
        Ok(())
    }

    /// Most recent entries first.
    pub fn list(&self, limit: usize) -> Vec<SuggestionLogEntry> {
        self.entries.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Status change made by the product catalogue once a human has decided.
    /// Rewrites the log file; no other field ever changes.
    pub fn set_status(&self, id: Uuid, status: SuggestionStatus) -> Result<Option<SuggestionLogEntry>> {
        let mut entries = self.entries.lock();
        let Some(idx) = entries.iter().position(|e| e.id == id) else {
            return Ok(None);
        };

        let mut next = entries.clone();
        next[idx].status = status;
        let mut data = String::new();
        for entry in &next {
            data.push_str(&serde_json::to_string(entry)?);
            data.push('\n');
        }
        write_atomic(&self.path, &data).context("Failed to rewrite suggestion log")?;

        let updated = next[idx].clone();
        *entries = next;
        Ok(Some(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(code: &str) -> SuggestionLogEntry {
        SuggestionLogEntry {
            id: Uuid::new_v4(),
            source_entity_id: Some("product-7".to_string()),
            matched_record_id: Uuid::new_v4(),
            suggested_primary_code: code.to_string(),
            suggested_secondary_code: code.chars().take(4).collect(),
            confidence: 0.72,
            status: SuggestionStatus::Suggested,
            model_identity: "test-model".to_string(),
            created_by: "tester".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suggestions.jsonl");
        {
            let log = SuggestionLog::open_or_create(&path).unwrap();
            log.append(entry("33019015")).unwrap();
            log.append(entry("33030010")).unwrap();
        }
        let log = SuggestionLog::open_or_create(&path).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.list(1)[0].suggested_primary_code, "33030010");
    }

    #[test]
    fn test_set_status_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suggestions.jsonl");
        let log = SuggestionLog::open_or_create(&path).unwrap();
        let e = entry("33019015");
        let id = e.id;
        log.append(e).unwrap();

        let updated = log.set_status(id, SuggestionStatus::Accepted).unwrap().unwrap();
        assert_eq!(updated.status, SuggestionStatus::Accepted);
        assert!(log.set_status(Uuid::new_v4(), SuggestionStatus::Accepted).unwrap().is_none());

        let reopened = SuggestionLog::open_or_create(&path).unwrap();
        assert_eq!(reopened.list(10)[0].status, SuggestionStatus::Accepted);
    }
}
