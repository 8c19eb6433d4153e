use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{doc, Index, IndexWriter, ReloadPolicy};
use uuid::Uuid;

use crate::models::ClassificationRecord;

/// Source of lexical relevance for the hybrid matcher.
pub trait LexicalSource: Send + Sync {
    /// Capability probe: can `relevance` be served right now?
    fn is_ready(&self) -> bool;

    /// Relevance per record in [0, 1], relative to the best hit for `query`.
    fn relevance(&self, query: &str, limit: usize) -> Result<HashMap<Uuid, f32>>;
}

/// In-memory BM25 index over codes, commodity names and descriptions, built on tantivy.
pub struct Bm25Index {
    index: Index,
    ready: AtomicBool,
    // Field handles
    f_record_id: Field,
    f_primary_code: Field,
    f_commodity_name: Field,
    f_description: Field,
}

impl Bm25Index {
    pub fn new() -> Self {
        let mut schema_builder = Schema::builder();
        let f_record_id = schema_builder.add_text_field("record_id", STRING | STORED);
        let f_primary_code = schema_builder.add_text_field("primary_code", STRING);
        let f_commodity_name = schema_builder.add_text_field("commodity_name", TEXT);
        let f_description = schema_builder.add_text_field("description", TEXT);
        let schema = schema_builder.build();

        Self {
            index: Index::create_in_ram(schema),
            ready: AtomicBool::new(false),
            f_record_id,
            f_primary_code,
            f_commodity_name,
            f_description,
        }
    }

    /// Replace the whole index with `records`.
    pub fn rebuild(&self, records: &[ClassificationRecord]) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);

        let mut writer: IndexWriter = self
            .index
            .writer(50_000_000)
            .context("Failed to create index writer")?;
        writer
            .delete_all_documents()
            .context("Failed to clear lexical index")?;

        for record in records {
            writer.add_document(doc!(
                self.f_record_id => record.id.to_string(),
                self.f_primary_code => record.primary_code.clone(),
                self.f_commodity_name => record.commodity_name.clone(),
                self.f_description => record.description.clone(),
            ))?;
        }

        writer.commit().context("Failed to commit lexical index")?;
        self.ready.store(true, Ordering::SeqCst);
        tracing::info!("Lexical index rebuilt with {} records", records.len());
        Ok(())
    }

    /// Raw BM25 hits for `query_str`, best first.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<(Uuid, f32)>> {
        let query_str = sanitize_query(query_str);
        if query_str.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("Failed to create reader")?;
        let searcher = reader.searcher();

        // Codes are indexed raw, so a code term only hits its exact record.
        let query_parser = QueryParser::for_index(
            &self.index,
            vec![self.f_primary_code, self.f_commodity_name, self.f_description],
        );
        let query = query_parser
            .parse_query(&query_str)
            .context("Failed to parse search query")?;

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .context("Search failed")?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .context("Failed to retrieve document")?;
            let record_id = doc
                .get_first(self.f_record_id)
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok());
            if let Some(id) = record_id {
                hits.push((id, score));
            }
        }
        Ok(hits)
    }
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new()
    }
}

impl LexicalSource for Bm25Index {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn relevance(&self, query: &str, limit: usize) -> Result<HashMap<Uuid, f32>> {
        let hits = self.search(query, limit)?;
        let top = hits.first().map(|(_, s)| *s).unwrap_or(0.0);
        if top <= 0.0 {
            return Ok(HashMap::new());
        }
        Ok(hits.into_iter().map(|(id, s)| (id, s / top)).collect())
    }
}

/// Keep only word characters so user text never trips the query grammar.
fn sanitize_query(query: &str) -> String {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
