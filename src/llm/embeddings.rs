use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::EmbeddingConfig;
use crate::error::EngineError;

/// Maximum characters sent per text to the embedding API.
/// Canonical texts are short; this only guards against pathological
/// descriptions blowing past the model context.
const MAX_EMBED_CHARS: usize = 3_000;

/// A feature-extraction model producing fixed-dimension, L2-normalized vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifies the model and version that produced a vector.
    fn model_identity(&self) -> String;

    /// Output dimension. Every vector this embedder returns has this length.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Longest prefix of `text` within `MAX_EMBED_CHARS` bytes that ends on a char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    match text.char_indices().find(|(i, c)| i + c.len_utf8() > MAX_EMBED_CHARS) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Reject vectors whose length does not match the configured dimension.
pub fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), EngineError> {
    if vector.len() != expected {
        return Err(EngineError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Ollama,
    OpenAi,
}

/// Embedding model served over HTTP (Ollama or an OpenAI-compatible API).
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: EmbeddingConfig,
    provider: Provider,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: EmbeddingConfig) -> Result<Self> {
        let provider = match config.provider.as_str() {
            "ollama" => Provider::Ollama,
            "openai" => Provider::OpenAi,
            other => anyhow::bail!("Unknown embedding provider: {other}"),
        };
        Ok(Self {
            client,
            config,
            provider,
        })
    }

    async fn request_ollama(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.model,
            "input": [text],
            // Over-long inputs are cut by the server instead of rejected.
            "truncate": true,
        });
        let parsed: OllamaResponse = self.post("Ollama", self.client.post(&url).json(&body)).await?;
        parsed
            .embeddings
            .into_iter()
            .next()
            .context("Ollama returned no embedding")
    }

    async fn request_openai(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.model,
            "input": [text],
        });
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }
        let parsed: OpenAiResponse = self.post("OpenAI", request).await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .context("OpenAI-compatible API returned no embedding")
    }

    async fn post<T: DeserializeOwned>(
        &self,
        label: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let resp = request
            .send()
            .await
            .with_context(|| format!("{label} embedding request failed"))?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("{label} embedding endpoint answered {status}: {detail}");
        }
        resp.json()
            .await
            .with_context(|| format!("Malformed {label} embedding response"))
    }
}

#[derive(Deserialize)]
struct OllamaResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiItem>,
}

#[derive(Deserialize)]
struct OpenAiItem {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_identity(&self) -> String {
        format!("{}:{}", self.config.provider, self.config.model)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = truncate_for_embedding(text);
        let mut vector = match self.provider {
            Provider::Ollama => self.request_ollama(text).await?,
            Provider::OpenAi => self.request_openai(text).await?,
        };
        check_dimension(self.config.dimension, &vector)?;
        l2_normalize(&mut vector);
        Ok(vector)
    }
}
