//! Browse aggregates keyed by chapter (first two characters of the code).
//!
//! Recomputed on every call. The catalogue is small and only changes by full
//! reload, so there is nothing to maintain incrementally.

use std::collections::BTreeMap;

use crate::models::{ChapterCount, ClassificationRecord};

/// Record counts per chapter, ordered by chapter key.
pub fn chapter_counts(records: &[ClassificationRecord]) -> Vec<ChapterCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.chapter_key()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(key, count)| ChapterCount {
            chapter_key: key.to_string(),
            count,
        })
        .collect()
}

/// Records in one chapter, ordered by primary code.
pub fn chapter_records(records: &[ClassificationRecord], chapter_key: &str) -> Vec<ClassificationRecord> {
    let mut matching: Vec<ClassificationRecord> = records
        .iter()
        .filter(|r| r.chapter_key() == chapter_key)
        .cloned()
        .collect();
    matching.sort_by(|a, b| a.primary_code.cmp(&b.primary_code));
    matching
}
