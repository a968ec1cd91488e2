//! Embedding providers: text → fixed-dimension dense vector.
//!
//! One provider serves both sides of the pipeline: offline chunk embedding
//! during ingestion and online query embedding during retrieval. Batch calls
//! are order-preserving, so callers can zip inputs against outputs.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::types::RagError;

/// Maps text to dense vectors of a fixed dimensionality.
///
/// Mixing dimensionalities within one index is a configuration error, so
/// every provider advertises its dimension up front via [`dimensions`].
///
/// [`dimensions`]: EmbeddingProvider::dimensions
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Embeds a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Dimensionality of every vector this provider produces.
    fn dimensions(&self) -> usize;
}

/// Client for OpenAI-compatible `/embeddings` endpoints.
///
/// Transient failures (timeouts, 429, 5xx) are retried with exponential
/// backoff up to the configured retry budget; anything else fails the call.
#[derive(Clone)]
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
    max_retries: usize,
}

impl OpenAiEmbeddings {
    pub fn new(settings: &Settings) -> Result<Self, RagError> {
        if settings.api_key.trim().is_empty() {
            return Err(RagError::Config("missing embedding API key".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|err| RagError::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", settings.api_base.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: settings.embedding_model.clone(),
            dimensions: settings.embedding_dimensions,
            max_retries: settings.max_retries,
        })
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        };

        let mut attempt = 0usize;
        loop {
            let outcome = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match outcome {
                Ok(resp) if resp.status().is_success() => {
                    let mut parsed: EmbeddingResponse = resp
                        .json()
                        .await
                        .map_err(|err| RagError::Embedding(err.to_string()))?;
                    parsed.data.sort_by_key(|entry| entry.index);
                    if parsed.data.len() != inputs.len() {
                        return Err(RagError::Embedding(format!(
                            "endpoint returned {} embeddings for {} inputs",
                            parsed.data.len(),
                            inputs.len()
                        )));
                    }
                    for entry in &parsed.data {
                        if entry.embedding.len() != self.dimensions {
                            return Err(RagError::Config(format!(
                                "expected {}-dimensional vectors, got {}",
                                self.dimensions,
                                entry.embedding.len()
                            )));
                        }
                    }
                    return Ok(parsed.data.into_iter().map(|e| e.embedding).collect());
                }
                Ok(resp) => {
                    let status = resp.status();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if retryable && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    let detail = resp.text().await.unwrap_or_default();
                    return Err(RagError::Embedding(format!(
                        "endpoint returned {status}: {detail}"
                    )));
                }
                Err(err) => {
                    let retryable = err.is_timeout() || err.is_connect();
                    if retryable && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(RagError::Embedding(err.to_string()));
                }
            }
        }
    }
}

pub(crate) fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(250u64.saturating_mul(1 << attempt.min(6)))
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let vectors = self.request(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("endpoint returned no embedding".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}

/// Deterministic hash-based provider for tests and offline runs.
///
/// Identical texts produce identical vectors; distinct texts almost always
/// differ. Vectors are L2-normalized so cosine similarity behaves like it
/// does with real embeddings.
#[derive(Clone)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        // FNV-1a seeded per component keeps the vector stable per text.
        let mut vector = vec![0.0f32; self.dimensions];
        for (i, slot) in vector.iter_mut().enumerate() {
            let mut hash: u64 = 0xcbf29ce484222325 ^ (i as u64).wrapping_mul(0x100000001b3);
            for byte in text.as_bytes() {
                hash ^= u64::from(*byte);
                hash = hash.wrapping_mul(0x100000001b3);
            }
            *slot = ((hash % 2000) as f32 / 1000.0) - 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn settings_for(base: String) -> Settings {
        Settings {
            api_key: "test-key".into(),
            api_base: base,
            chat_model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
            embedding_dimensions: 3,
            namespace: "test".into(),
            similarity_threshold: 0.25,
            upsert_batch_size: 100,
            max_retries: 3,
            mcq_option_count: 4,
            request_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn mock_provider_is_deterministic() {
        let provider = MockEmbeddingProvider::new(16);
        let a = provider.embed("photosynthesis").await.unwrap();
        let b = provider.embed("photosynthesis").await.unwrap();
        let c = provider.embed("combustion").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn mock_vectors_are_normalized() {
        let provider = MockEmbeddingProvider::new(32);
        let v = provider.embed("cell structure").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(serde_json::json!({
                    "data": [
                        {"index": 1, "embedding": [0.0, 1.0, 0.0]},
                        {"index": 0, "embedding": [1.0, 0.0, 0.0]}
                    ]
                }));
            })
            .await;

        let provider = OpenAiEmbeddings::new(&settings_for(server.base_url())).unwrap();
        let texts = vec!["first".to_string(), "second".to_string()];
        let vectors = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_config_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(serde_json::json!({
                    "data": [{"index": 0, "embedding": [1.0, 0.0]}]
                }));
            })
            .await;

        let provider = OpenAiEmbeddings::new(&settings_for(server.base_url())).unwrap();
        let err = provider.embed("text").await.unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[tokio::test]
    async fn server_error_surfaces_after_retries() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(500).body("upstream exploded");
            })
            .await;

        let provider = OpenAiEmbeddings::new(&settings_for(server.base_url())).unwrap();
        let err = provider.embed("text").await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
        mock.assert_hits_async(3).await;
    }
}
