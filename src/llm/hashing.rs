//! Deterministic offline embedder.
//!
//! Feature hashing over lowercase alphanumeric tokens: each token maps to one
//! bucket via `blake3`, token vectors are mean-pooled, and the result is
//! L2-normalized. Not a neural model, but it satisfies the embedder contract
//! and lets the pipeline run without a model server.

use anyhow::Result;
use async_trait::async_trait;

use super::embeddings::{l2_normalize, Embedder};

pub const DEFAULT_HASHING_DIM: usize = 256;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        anyhow::ensure!(dimension > 0, "hashing embedder dimension must be positive");
        Ok(Self { dimension })
    }

    /// Synchronous core, shared by the trait impl and tests.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut tokens = 0usize;

        for token in tokenize(&text.to_lowercase()) {
            vector[self.bucket(token)] += 1.0;
            tokens += 1;
        }

        if tokens > 0 {
            for x in vector.iter_mut() {
                *x /= tokens as f32;
            }
            l2_normalize(&mut vector);
        }
        vector
    }

    fn bucket(&self, token: &str) -> usize {
        let hash = blake3::hash(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        (u64::from_le_bytes(head) % self.dimension as u64) as usize
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_identity(&self) -> String {
        format!("hashing:blake3-{}", self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}
