//! Lexical boost: exact, prefix, and substring evidence from the raw query.
//!
//! Weights are empirical. Only their ordering matters:
//! exact > prefix > substring > BM25 similarity contribution.

use crate::models::ClassificationRecord;

pub const EXACT_WEIGHT: f32 = 100.0;
pub const PREFIX_WEIGHT: f32 = 50.0;
pub const SUBSTRING_WEIGHT: f32 = 20.0;
/// Multiplier on relative BM25 relevance in [0, 1].
pub const SIMILARITY_WEIGHT: f32 = 10.0;

/// Terms shorter than this never produce prefix/substring evidence.
const MIN_TERM_LEN: usize = 3;

/// Query pre-normalized once per request.
pub struct LexicalQuery {
    phrase: String,
    terms: Vec<String>,
}

impl LexicalQuery {
    pub fn new(raw: &str) -> Self {
        let terms: Vec<String> = raw
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();
        Self {
            phrase: terms.join(" "),
            terms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Lexical score for one record, normalized to [0, 1].
pub fn lexical_score(query: &LexicalQuery, record: &ClassificationRecord, bm25_relevance: f32) -> f32 {
    if query.is_empty() {
        return 0.0;
    }

    let name = normalize(&record.commodity_name);
    let description = normalize(&record.description);
    let primary = record.primary_code.as_str();
    let secondary = record.secondary_code.as_str();

    let exact = query.phrase == primary
        || query.phrase == secondary
        || (!name.is_empty() && (query.phrase == name || contains_phrase(&query.phrase, &name)));

    let prefix = !exact
        && query.terms.iter().any(|t| {
            let numeric = t.chars().all(|c| c.is_ascii_digit());
            (numeric && t.len() >= 2 && primary.starts_with(t.as_str()))
                || (t.len() >= MIN_TERM_LEN && name.split(' ').any(|w| w.starts_with(t.as_str())))
        });

    // Word starts only: `oil` matches "oils" but not "toilet".
    let substring = query.terms.iter().any(|t| {
        t.len() >= MIN_TERM_LEN && description.split(' ').any(|w| w.starts_with(t.as_str()))
    });

    let tier = if exact {
        EXACT_WEIGHT
    } else if prefix {
        PREFIX_WEIGHT
    } else if substring {
        SUBSTRING_WEIGHT
    } else {
        0.0
    };

    let raw = tier + bm25_relevance.clamp(0.0, 1.0) * SIMILARITY_WEIGHT;
    (raw / EXACT_WEIGHT).min(1.0)
}

/// Blend cosine similarity with lexical evidence. Lexical evidence only lifts.
pub fn blend(cosine: f32, lexical: f32) -> f32 {
    const LEXICAL_SHARE: f32 = 0.5;
    let cosine = cosine.clamp(0.0, 1.0);
    (cosine + (1.0 - cosine) * LEXICAL_SHARE * lexical.clamp(0.0, 1.0)).min(1.0)
}

fn normalize(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whole-word phrase containment on normalized text.
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    format!(" {haystack} ").contains(&format!(" {needle} "))
}
