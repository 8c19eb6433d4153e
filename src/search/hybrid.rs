use anyhow::Result;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::EngineError;
use crate::models::ClassificationRecord;
use crate::search::bm25::LexicalSource;
use crate::search::lexical::{blend, lexical_score, LexicalQuery};
use crate::search::vector;
use crate::store::catalogue::CatalogueStore;
use crate::store::embeddings::EmbeddingStore;

/// Retrieval strategy, chosen per request by a capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Cosine similarity blended with lexical evidence
    Hybrid,
    /// Cosine similarity alone
    VectorOnly,
}

impl SearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::Hybrid => "hybrid",
            SearchStrategy::VectorOnly => "vector_only",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    pub limit: usize,
    pub threshold: f32,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            threshold: 0.15,
        }
    }
}

/// One ranked record. Same shape whichever strategy produced it.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub record: ClassificationRecord,
    /// Score used for ranking and tiering, in [0, 1]
    pub similarity: f32,
    pub vector_score: f32,
    pub lexical_score: f32,
}

#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub candidates: Vec<MatchCandidate>,
    pub strategy: SearchStrategy,
}

/// Ranks catalogue records against a query embedding and its raw text.
pub struct Matcher {
    catalogue: Arc<CatalogueStore>,
    embeddings: Arc<EmbeddingStore>,
    lexical: Option<Arc<dyn LexicalSource>>,
}

impl Matcher {
    pub fn new(
        catalogue: Arc<CatalogueStore>,
        embeddings: Arc<EmbeddingStore>,
        lexical: Option<Arc<dyn LexicalSource>>,
    ) -> Self {
        Self {
            catalogue,
            embeddings,
            lexical,
        }
    }

    /// Hybrid when a lexical source is attached and ready, vector-only otherwise.
    pub fn probe(&self) -> SearchStrategy {
        match &self.lexical {
            Some(lexical) if lexical.is_ready() => SearchStrategy::Hybrid,
            _ => SearchStrategy::VectorOnly,
        }
    }

    /// Probe, run the chosen strategy, and fall back to vector-only if hybrid errors.
    ///
    /// Only a dimension mismatch is returned as an error.
    pub fn find_matches(
        &self,
        query_text: &str,
        query_vector: &[f32],
        opts: &MatchOptions,
    ) -> Result<MatchOutcome> {
        self.check_dimension(query_vector)?;

        if self.probe() == SearchStrategy::Hybrid {
            match self.hybrid(query_text, query_vector, opts) {
                Ok(candidates) => {
                    return Ok(MatchOutcome {
                        candidates,
                        strategy: SearchStrategy::Hybrid,
                    })
                }
                Err(e) => {
                    tracing::warn!("Hybrid retrieval failed, falling back to vector-only: {e:#}");
                }
            }
        }

        Ok(MatchOutcome {
            candidates: self.vector_only(query_vector, opts),
            strategy: SearchStrategy::VectorOnly,
        })
    }

    /// Cosine similarity lifted by exact/prefix/substring/BM25 evidence.
    pub fn hybrid(
        &self,
        query_text: &str,
        query_vector: &[f32],
        opts: &MatchOptions,
    ) -> Result<Vec<MatchCandidate>> {
        let lexical = self
            .lexical
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No lexical source attached"))?;
        let relevance = lexical.relevance(query_text, self.catalogue.len().max(1))?;
        let query = LexicalQuery::new(query_text);

        let vectors = self.embeddings.processed_vectors();
        let candidates = vector::scan(query_vector, &vectors)
            .into_iter()
            .filter_map(|(id, cosine)| {
                let record = self.catalogue.get(&id)?;
                let bm25 = relevance.get(&id).copied().unwrap_or(0.0);
                let lexical = lexical_score(&query, &record, bm25);
                Some(MatchCandidate {
                    similarity: blend(cosine, lexical),
                    vector_score: cosine,
                    lexical_score: lexical,
                    record,
                })
            })
            .collect();

        Ok(rank(candidates, opts))
    }

    /// Pure cosine similarity with the same threshold and limit.
    pub fn vector_only(&self, query_vector: &[f32], opts: &MatchOptions) -> Vec<MatchCandidate> {
        let vectors = self.embeddings.processed_vectors();
        let candidates = vector::scan(query_vector, &vectors)
            .into_iter()
            .filter_map(|(id, cosine)| {
                let record = self.catalogue.get(&id)?;
                Some(MatchCandidate {
                    similarity: cosine.clamp(0.0, 1.0),
                    vector_score: cosine,
                    lexical_score: 0.0,
                    record,
                })
            })
            .collect();

        rank(candidates, opts)
    }

    fn check_dimension(&self, query_vector: &[f32]) -> Result<(), EngineError> {
        match self.embeddings.stored_dimension() {
            Some(dim) if dim != query_vector.len() => Err(EngineError::DimensionMismatch {
                expected: dim,
                actual: query_vector.len(),
            }),
            _ => Ok(()),
        }
    }
}

/// Drop candidates under the threshold, order by similarity descending with
/// `primary_code` ascending as tie-break, and keep the top `limit`.
pub fn rank(mut candidates: Vec<MatchCandidate>, opts: &MatchOptions) -> Vec<MatchCandidate> {
    candidates.retain(|c| c.similarity >= opts.threshold);
    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.record.primary_code.cmp(&b.record.primary_code))
    });
    candidates.truncate(opts.limit);
    candidates
}
