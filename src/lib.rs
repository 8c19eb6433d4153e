//! # tariff-match
//!
//! Tariff-code classification engine. Ingests a catalogue of trade
//! classification codes from flattened text, embeds every entry, and matches
//! product descriptions against the catalogue with a hybrid lexical + vector
//! ranking and a calibrated confidence tier.
//!
//! ## Architecture
//!
//! ```text
//!   Ingestion (offline)                      Query time
//!   ───────────────────                      ──────────
//!   ┌──────────────┐                   ┌───────────────────┐
//!   │ Raw corpus    │                   │ Product attributes │
//!   └──────┬───────┘                   │   or free text     │
//!          ▼                            └─────────┬─────────┘
//!   ┌──────────────┐                              ▼
//!   │ RecordParser  │                   ┌───────────────────┐
//!   │ label+code+…  │                   │ Canonical query    │
//!   └──────┬───────┘                   └─────────┬─────────┘
//!          ▼                                      ▼
//!   ┌──────────────┐   ┌──────────────┐   ┌───────────────────┐
//!   │ Catalogue     │──▶│ run_batch     │   │ Embedder (shared)  │
//!   │ (unique codes)│   │ page → skip   │   └─────────┬─────────┘
//!   └──────┬───────┘   │ done → embed  │             ▼
//!          │           │ → upsert page │   ┌───────────────────┐
//!          │           └──────┬───────┘   │ Matcher            │
//!          │                  ▼           │  probe: hybrid?    │
//!          │           ┌──────────────┐   │  cosine + lexical  │
//!          │           │ EmbeddingStore│──▶│  or cosine only    │
//!          │           └──────────────┘   └─────────┬─────────┘
//!          ▼                                        ▼
//!   ┌──────────────┐                       ┌───────────────────┐
//!   │ BM25 index    │──────────────────────▶│ Tiers + audit log  │
//!   └──────────────┘                       └───────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, model, parser, and matcher
//! - [`models`] - Records, embedding rows, suggestion log entries, request/response types
//! - [`error`] - Fatal configuration errors (embedding dimension mismatch)
//! - [`ingest::parser`] - Heuristic `label code description` extraction from flattened text
//! - [`ingest::canonical`] - Deterministic canonical text for records and queries
//! - [`llm`] - Embedding providers (Ollama, OpenAI-compatible, offline hashing) and the lazy handle
//! - [`store`] - JSON-backed catalogue, embedding store, and append-only suggestion log
//! - [`pipeline`] - Resumable, idempotent embedding batch
//! - [`search::bm25`] - tantivy BM25 index used as the lexical side of hybrid search
//! - [`search::hybrid`] - Matcher with hybrid and vector-only strategies
//! - [`classify`] - Confidence tiering and suggestion audit
//! - [`chapters`] - Per-chapter counts and drill-down
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state

pub mod api;
pub mod chapters;
pub mod classify;
pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod state;
pub mod store;
