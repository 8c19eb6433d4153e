use uuid::Uuid;

/// Exact cosine similarity of `query` against every stored vector, best first.
///
/// The catalogue is thousands of entries, not millions, so a full scan is fine.
pub fn scan(query: &[f32], vectors: &[(Uuid, Vec<f32>)]) -> Vec<(Uuid, f32)> {
    let mut scored: Vec<(Uuid, f32)> = vectors
        .iter()
        .map(|(id, v)| (*id, cosine_similarity(query, v)))
        .collect();

    // Sort descending by score
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
