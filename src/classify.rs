//! Query-time classification: canonicalize, embed, match, tier, and audit.
//!
//! The engine only proposes. The top candidate is logged as a suggestion
//! whatever its tier; assigning a code to a product is the product
//! catalogue's job, after a human confirms it.

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::ingest::canonical;
use crate::llm::embeddings::Embedder;
use crate::models::{
    CandidateView, ConfidenceTier, ProductAttributes, SuggestionLogEntry, SuggestionStatus,
};
use crate::search::hybrid::{MatchCandidate, MatchOptions, Matcher, SearchStrategy};
use crate::store::audit::SuggestionLog;

pub const NO_MATCH_MESSAGE: &str =
    "No matching classification codes found. Add more descriptive text (material, use, composition) and try again.";

/// What is being classified.
#[derive(Debug, Clone)]
pub enum QueryInput {
    Attributes(ProductAttributes),
    FreeText(String),
}

impl QueryInput {
    pub fn canonical_text(&self, max_chars: usize) -> String {
        match self {
            QueryInput::Attributes(attrs) => canonical::product_text(attrs, max_chars),
            QueryInput::FreeText(text) => canonical::free_text(text, max_chars),
        }
    }
}

/// Who asked, for the audit trail.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub source_entity_id: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub query_text: String,
    pub candidates: Vec<(MatchCandidate, ConfidenceTier)>,
    pub strategy: SearchStrategy,
    pub suggestion: Option<SuggestionLogEntry>,
}

impl Classification {
    pub fn views(&self) -> Vec<CandidateView> {
        self.candidates
            .iter()
            .map(|(c, tier)| CandidateView {
                primary_code: c.record.primary_code.clone(),
                secondary_code: c.record.secondary_code.clone(),
                commodity_name: c.record.commodity_name.clone(),
                description: c.record.description.clone(),
                tax_rate: c.record.tax_rate,
                similarity: c.similarity,
                confidence: *tier,
            })
            .collect()
    }
}

pub async fn classify(
    matcher: &Matcher,
    embedder: &dyn Embedder,
    audit: &SuggestionLog,
    input: &QueryInput,
    ctx: &RequestContext,
    opts: &MatchOptions,
    max_query_chars: usize,
) -> Result<Classification> {
    let query_text = input.canonical_text(max_query_chars);
    if query_text.is_empty() {
        return Ok(Classification {
            query_text,
            candidates: Vec::new(),
            strategy: matcher.probe(),
            suggestion: None,
        });
    }

    let query_vector = embedder
        .embed(&query_text)
        .await
        .context("Failed to embed classification query")?;
    let outcome = matcher.find_matches(&query_text, &query_vector, opts)?;

    let candidates: Vec<(MatchCandidate, ConfidenceTier)> = outcome
        .candidates
        .into_iter()
        .map(|c| {
            let tier = ConfidenceTier::from_score(c.similarity);
            (c, tier)
        })
        .collect();

    let suggestion = match candidates.first() {
        Some((top, tier)) => {
            let entry = SuggestionLogEntry {
                id: Uuid::new_v4(),
                source_entity_id: ctx.source_entity_id.clone(),
                matched_record_id: top.record.id,
                suggested_primary_code: top.record.primary_code.clone(),
                suggested_secondary_code: top.record.secondary_code.clone(),
                confidence: top.similarity,
                status: SuggestionStatus::Suggested,
                model_identity: embedder.model_identity(),
                created_by: ctx.created_by.clone(),
                created_at: Utc::now(),
            };
            audit.append(entry.clone()).context("Failed to record suggestion")?;
            tracing::info!(
                "Suggested {} ({}, {:.3}) for {:?} via {}",
                entry.suggested_primary_code,
                tier.label(),
                entry.confidence,
                ctx.source_entity_id,
                outcome.strategy.as_str()
            );
            Some(entry)
        }
        None => {
            tracing::info!("No classification candidates for query {query_text:?}");
            None
        }
    };

    Ok(Classification {
        query_text,
        candidates,
        strategy: outcome.strategy,
        suggestion,
    })
}
