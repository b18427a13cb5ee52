//! Embedding backend abstraction.
//!
//! [`Embedder`] is the seam the classifier calls through. The only concrete
//! backend is [`OpenAiEmbedder`], which talks to any OpenAI-compatible
//! `POST /embeddings` endpoint (OpenAI, Groq-style gateways, a local Ollama).

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::EmbeddingError;

/// Turns text into a vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Cosine similarity between two vectors.
///
/// Returns `0.0` for empty vectors, mismatched lengths, or zero-norm input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Configuration for the HTTP embedding backend.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Base URL without the trailing `/embeddings`.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl EmbeddingConfig {
    /// Build from `UNIFY_EMBEDDING_*` environment variables, falling back to
    /// `OPENAI_API_KEY` for the key.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("UNIFY_EMBEDDING_URL").unwrap_or(defaults.base_url);
        let model = std::env::var("UNIFY_EMBEDDING_MODEL").unwrap_or(defaults.model);
        let api_key = std::env::var("UNIFY_EMBEDDING_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .map(SecretString::from);
        let timeout = std::env::var("UNIFY_EMBEDDING_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self {
            base_url,
            model,
            api_key,
            timeout,
        }
    }
}

/// Embedder backed by an OpenAI-compatible HTTP endpoint.
pub struct OpenAiEmbedder {
    config: EmbeddingConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::RequestFailed(format!("Failed to build client: {e}")))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "input": [text],
        });

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EmbeddingError::Timeout(self.config.timeout)
            } else {
                EmbeddingError::RequestFailed(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(EmbeddingError::RequestFailed(format!("HTTP {status}: {text}")));
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding data".into()))
    }
}
