use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::ingest;
use crate::ingest::parser::RecordParser;
use crate::llm::EmbedderHandle;
use crate::search::bm25::{Bm25Index, LexicalSource};
use crate::search::hybrid::Matcher;
use crate::store::audit::SuggestionLog;
use crate::store::catalogue::{CatalogueStore, InsertSummary};
use crate::store::embeddings::EmbeddingStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub catalogue: Arc<CatalogueStore>,
    pub embeddings: Arc<EmbeddingStore>,
    pub lexical: Arc<Bm25Index>,
    pub audit: Arc<SuggestionLog>,
    pub matcher: Arc<Matcher>,
    pub embedder: Arc<EmbedderHandle>,
    pub parser: Arc<RecordParser>,
    /// Held while a batch or a reload runs; one writer at a time.
    pub batch_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        let embedder = EmbedderHandle::new(config.embedding.clone(), http_client);
        Self::with_embedder(config, embedder)
    }

    /// State with a caller-supplied embedder handle (tests pass a preloaded fake).
    pub fn with_embedder(config: Config, embedder: EmbedderHandle) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let catalogue = Arc::new(CatalogueStore::open_or_create(&config.catalogue_path())?);
        let embeddings = Arc::new(EmbeddingStore::open_or_create(&config.embeddings_path())?);
        let audit = Arc::new(SuggestionLog::open_or_create(&config.suggestions_path())?);

        let lexical = Arc::new(Bm25Index::new());
        if let Err(e) = lexical.rebuild(&catalogue.all()) {
            // Matching still works, vector-only.
            tracing::warn!("Lexical index unavailable at startup: {e:#}");
        }

        let matcher = Arc::new(Matcher::new(
            Arc::clone(&catalogue),
            Arc::clone(&embeddings),
            Some(Arc::clone(&lexical) as Arc<dyn LexicalSource>),
        ));
        let parser = Arc::new(RecordParser::new(config.parser.clone())?);

        tracing::info!(
            "Loaded {} catalogue records, {} embeddings, {} suggestions",
            catalogue.len(),
            embeddings.entry_count(),
            audit.len()
        );

        Ok(Self {
            config,
            catalogue,
            embeddings,
            lexical,
            audit,
            matcher,
            embedder: Arc::new(embedder),
            parser,
            batch_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Wipe-and-reload: parse `corpus`, replace the catalogue, drop every
    /// embedding, and rebuild the lexical index.
    pub async fn reload_catalogue(&self, corpus: &str, source: &str) -> Result<InsertSummary> {
        let _guard = self.batch_lock.lock().await;

        let records = ingest::into_records(self.parser.parse(corpus), source);
        // Vectors first, so none outlive the record ids they are keyed to.
        self.embeddings
            .clear()
            .context("Failed to clear embeddings")?;
        let summary = self
            .catalogue
            .replace_all(records)
            .context("Failed to replace catalogue")?;

        self.rebuild_lexical();

        tracing::info!(
            "Catalogue reloaded from {source}: {} records, {} duplicates skipped",
            summary.inserted,
            summary.skipped_duplicates
        );
        Ok(summary)
    }

    /// Additive ingest: new code pairs are inserted, existing ones keep their
    /// id and embedding and are tagged with `source`.
    pub async fn merge_catalogue(&self, corpus: &str, source: &str) -> Result<InsertSummary> {
        let _guard = self.batch_lock.lock().await;

        let records = ingest::into_records(self.parser.parse(corpus), source);
        let summary = self
            .catalogue
            .merge(records, source)
            .context("Failed to merge catalogue")?;
        self.rebuild_lexical();

        tracing::info!(
            "Catalogue merged from {source}: {} new, {} retagged, {} duplicates skipped",
            summary.inserted,
            summary.retagged,
            summary.skipped_duplicates
        );
        Ok(summary)
    }

    fn rebuild_lexical(&self) {
        if let Err(e) = self.lexical.rebuild(&self.catalogue.all()) {
            tracing::warn!("Lexical index rebuild failed, matching falls back to vector-only: {e:#}");
        }
    }
}
