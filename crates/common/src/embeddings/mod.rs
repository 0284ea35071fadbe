//! Embedding service abstraction
//!
//! Provides a unified interface for embedding providers:
//! - OpenAI-compatible endpoints (text-embeddings-inference, vLLM, OpenAI)
//! - A deterministic hashing embedder for tests and offline runs

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::http::LazyClient;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Release pooled connections
    async fn close(&self) {}
}

/// OpenAI-compatible `/embeddings` client
pub struct OpenAIEmbedder {
    http: LazyClient,
    model: String,
    base_url: String,
    attempts: u32,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    /// Vectors in input order; the count must match what was sent
    fn into_vectors(mut self, expected: usize) -> Result<Vec<Vec<f32>>> {
        if self.data.len() != expected {
            return Err(AppError::VectorStore {
                message: format!("embedding count mismatch: sent {}, got {}", expected, self.data.len()),
            });
        }
        self.data.sort_by_key(|d| d.index);
        Ok(self.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|_| AppError::Configuration {
                message: "embedding api_key is not a valid header value".to_string(),
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Self {
            http: LazyClient::with_headers(Duration::from_secs(config.timeout_secs), headers),
            model: config.model.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            attempts: config.max_retries.max(1),
            batch_size: config.batch_size.max(1),
        })
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 1;
        loop {
            match self.post(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if attempt < self.attempts => {
                    tracing::warn!(attempt, model = %self.model, error = %e, "Embedding call failed");
                    tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .http
            .get()
            .await?
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                input: texts,
                model: &self.model,
            })
            .send()
            .await
            .map_err(|e| AppError::VectorStore {
                message: format!("embedding endpoint unreachable: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorStore {
                message: format!("embedding endpoint returned {}: {}", status.as_u16(), body),
            });
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| AppError::VectorStore {
            message: format!("malformed embedding response: {}", e),
        })?;
        parsed.into_vectors(texts.len())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_chunk(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| AppError::VectorStore {
                message: "embedding endpoint returned no vectors".to_string(),
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_chunk(batch).await?);
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn close(&self) {
        self.http.close().await;
    }
}

/// Deterministic bag-of-words embedder using feature hashing.
///
/// Texts sharing terms land close together, which is enough for the
/// in-memory store in tests and offline demos.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.split_whitespace() {
            let token: String = token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            if token.is_empty() {
                continue;
            }
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
            ]) as usize
                % self.dimension;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hash-embedding"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_embedder_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("Psilocybin therapy").await.unwrap();
        let b = embedder.embed("psilocybin THERAPY!").await.unwrap();
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_response_reordered_by_index() {
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{"data": [{"index": 1, "embedding": [2.0]}, {"index": 0, "embedding": [1.0]}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_vectors(2).unwrap(), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_response_count_mismatch() {
        let response: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [1.0]}]}"#).unwrap();
        assert!(matches!(response.into_vectors(2), Err(AppError::VectorStore { .. })));
    }

    #[tokio::test]
    async fn test_hash_embedder_empty_text() {
        let embedder = HashEmbedder::new(8);
        let v = embedder.embed("   ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
