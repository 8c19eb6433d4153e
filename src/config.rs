use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::llm::hashing::DEFAULT_HASHING_DIM;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the catalogue, embeddings, and suggestion log are stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Embedding model configuration
    pub embedding: EmbeddingConfig,
    /// Record parser tuning
    pub parser: ParserConfig,
    /// Embedding batch pipeline settings
    pub batch: BatchConfig,
    /// Matcher defaults
    pub matcher: MatcherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "ollama", "openai", or "hashing" (offline, deterministic)
    pub provider: String,
    /// Base URL for the embedding API
    pub base_url: String,
    /// Model name for embeddings
    pub model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension. Must match every stored vector.
    pub dimension: usize,
}

/// Heuristic thresholds for the catalogue parser. These are tuned per corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Longest category label kept; longer captures keep only their tail.
    pub max_category_len: usize,
    /// Descriptions shorter than this are logged as suspicious.
    pub min_description_len: usize,
    /// Repeated table headers stripped from descriptions.
    pub boilerplate: Vec<String>,
    /// Regex for section heading lines (e.g. `Chapter 34 ...`) removed from
    /// description windows. Empty disables it.
    pub heading_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Records fetched per page of the embedding pipeline
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Default number of candidates returned
    pub limit: usize,
    /// Candidates below this similarity are dropped
    pub threshold: f32,
    /// Query text is truncated to this many characters before embedding
    pub max_query_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9100".to_string(),
            embedding: EmbeddingConfig::default(),
            parser: ParserConfig::default(),
            batch: BatchConfig::default(),
            matcher: MatcherConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "all-minilm".to_string(),
            api_key: None,
            dimension: 384,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_category_len: 200,
            min_description_len: 15,
            boilerplate: vec![
                "ITC(HS) Code".to_string(),
                "Item Description".to_string(),
                "Export Policy".to_string(),
                "Policy Condition".to_string(),
                "Unit of Quantity".to_string(),
            ],
            heading_pattern: r"(?mi)^[ \t]*chapter[ \t]+\d{1,2}\b.*$".to_string(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { page_size: 16 }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            threshold: 0.15,
            max_query_chars: 2_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("TARIFF_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("TARIFF_BIND_ADDR") {
            config.bind_addr = addr;
        }

        // Embedding model
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            if provider == "hashing" {
                config.embedding.dimension = DEFAULT_HASHING_DIM;
            }
            config.embedding.provider = provider;
        }
        if let Ok(url) = std::env::var("EMBEDDING_BASE_URL") {
            config.embedding.base_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.embedding.dimension = d;
            }
        }

        // Parser
        if let Ok(val) = std::env::var("TARIFF_MAX_CATEGORY_LEN") {
            if let Ok(v) = val.parse() {
                config.parser.max_category_len = v;
            }
        }
        if let Ok(val) = std::env::var("TARIFF_MIN_DESCRIPTION_LEN") {
            if let Ok(v) = val.parse() {
                config.parser.min_description_len = v;
            }
        }

        if let Ok(val) = std::env::var("TARIFF_HEADING_PATTERN") {
            config.parser.heading_pattern = val;
        }

        // Batch + matcher
        if let Ok(val) = std::env::var("TARIFF_BATCH_PAGE_SIZE") {
            if let Ok(v) = val.parse::<usize>() {
                config.batch.page_size = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("TARIFF_MATCH_LIMIT") {
            if let Ok(v) = val.parse::<usize>() {
                config.matcher.limit = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("TARIFF_MATCH_THRESHOLD") {
            if let Ok(v) = val.parse::<f32>() {
                config.matcher.threshold = v.clamp(0.0, 1.0);
            }
        }
        if let Ok(val) = std::env::var("TARIFF_MAX_QUERY_CHARS") {
            if let Ok(v) = val.parse() {
                config.matcher.max_query_chars = v;
            }
        }

        config
    }

    pub fn catalogue_path(&self) -> PathBuf {
        self.data_dir.join("catalogue.json")
    }

    pub fn embeddings_path(&self) -> PathBuf {
        self.data_dir.join("embeddings.json")
    }

    pub fn suggestions_path(&self) -> PathBuf {
        self.data_dir.join("suggestions.jsonl")
    }
}
