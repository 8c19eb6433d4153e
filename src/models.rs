use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One catalogue entry. Immutable after ingestion apart from `sources`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationRecord {
    pub id: Uuid,
    /// 6-8 digit commodity code
    pub primary_code: String,
    /// First four characters of `primary_code`
    pub secondary_code: String,
    pub commodity_name: String,
    pub description: String,
    pub tax_rate: Option<f64>,
    pub hierarchy_context: Option<String>,
    /// Provenance tags appended by ingestion runs
    #[serde(default)]
    pub sources: Vec<String>,
}

impl ClassificationRecord {
    /// Key used to enforce catalogue uniqueness.
    pub fn code_key(&self) -> (String, String) {
        (self.primary_code.clone(), self.secondary_code.clone())
    }

    /// Coarse browse bucket: the first two characters of the primary code.
    pub fn chapter_key(&self) -> &str {
        let end = self
            .primary_code
            .char_indices()
            .nth(2)
            .map(|(i, _)| i)
            .unwrap_or(self.primary_code.len());
        &self.primary_code[..end]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    Pending,
    Processed,
    Failed,
}

/// Vector representation of one `ClassificationRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub record_id: Uuid,
    /// L2-normalized; empty unless `status` is `Processed`
    pub vector: Vec<f32>,
    pub status: EmbeddingStatus,
    pub model_identity: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Suggested,
    Accepted,
    Overridden,
}

/// Audit row for a query-time match. Records a suggestion, never an assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionLogEntry {
    pub id: Uuid,
    pub source_entity_id: Option<String>,
    pub matched_record_id: Uuid,
    pub suggested_primary_code: String,
    pub suggested_secondary_code: String,
    pub confidence: f32,
    pub status: SuggestionStatus,
    pub model_identity: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Human-facing confidence bucket, ordered best first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Excellent,
    Good,
    Fair,
    Low,
}

impl ConfidenceTier {
    /// Tier for a similarity in [0, 1]. Lower edges are inclusive.
    pub fn from_score(similarity: f32) -> Self {
        if similarity >= 0.80 {
            ConfidenceTier::Excellent
        } else if similarity >= 0.60 {
            ConfidenceTier::Good
        } else if similarity >= 0.40 {
            ConfidenceTier::Fair
        } else {
            ConfidenceTier::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceTier::Excellent => "Excellent",
            ConfidenceTier::Good => "Good",
            ConfidenceTier::Fair => "Fair",
            ConfidenceTier::Low => "Low",
        }
    }
}

/// Structured attributes supplied by the product catalogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductAttributes {
    #[serde(default)]
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Material or context tags, e.g. "cotton", "industrial"
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form key/value attributes; ordered so canonical text is stable
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Classification request
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyRequest {
    pub source_entity_id: Option<String>,
    pub attributes: Option<ProductAttributes>,
    pub text: Option<String>,
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
    #[serde(default = "default_created_by")]
    pub created_by: String,
}

fn default_created_by() -> String {
    "system".to_string()
}

/// One ranked candidate as returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct CandidateView {
    pub primary_code: String,
    pub secondary_code: String,
    pub commodity_name: String,
    pub description: String,
    pub tax_rate: Option<f64>,
    pub similarity: f32,
    pub confidence: ConfidenceTier,
}

/// Classification response
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyResponse {
    pub candidates: Vec<CandidateView>,
    pub count: usize,
    pub strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Embedding batch trigger request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRequest {
    pub limit: Option<usize>,
}

/// Per-chapter record count
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChapterCount {
    pub chapter_key: String,
    pub count: usize,
}
