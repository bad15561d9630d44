use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::GatewayError;

const TARGET_DIM: usize = 3072;
const RETRY_BACKOFF: Duration = Duration::from_millis(250);
const WALLCLOCK_BUDGET: Duration = Duration::from_secs(2);

/// C1 — text to unit-normed vector, with timeout/retry collapsed to ⊥.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// `embed(text) -> vector | ⊥` (§4.1). Returns `None` on any provider
    /// error after one retry; the caller is expected to classify that as
    /// `EMBEDDING_ERROR` and store nothing.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl HttpEmbedder {
    pub fn new(api_key: String, base_url: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com/v1".to_string()),
            model,
        }
    }

    async fn call_once(&self, text: &str) -> Result<Vec<f32>, GatewayError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Api { status, message });
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| GatewayError::Parse("empty embedding response".to_string()))?;

        Ok(normalize(vector))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let attempt = tokio::time::timeout(WALLCLOCK_BUDGET, self.call_once(text)).await;

        match attempt {
            Ok(Ok(vector)) => Some(vector),
            Ok(Err(e)) => {
                warn!(error = %e, "embedder first attempt failed, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                match tokio::time::timeout(WALLCLOCK_BUDGET, self.call_once(text)).await {
                    Ok(Ok(vector)) => Some(vector),
                    Ok(Err(e)) => {
                        warn!(error = %e, "embedder retry failed");
                        None
                    }
                    Err(_) => {
                        warn!("embedder retry timed out");
                        None
                    }
                }
            }
            Err(_) => {
                warn!("embedder first attempt timed out");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Rescale to unit length; an all-zero vector is left as-is (degenerate but
/// not a panic case).
fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

/// Deterministic, dependency-free stand-in used by tests and by deployments
/// without a configured embedding provider. Hashes the input into a
/// reproducible 3072-dim unit vector — not semantically meaningful, but
/// stable across calls so dedup/ranking logic can be exercised without a
/// network.
pub struct DeterministicEmbedder;

#[async_trait]
impl Embedder for DeterministicEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        Some(deterministic_vector(text))
    }
}

pub fn deterministic_vector(text: &str) -> Vec<f32> {
    let mut state: u64 = 1469598103934665603; // FNV offset basis
    let mut v = Vec::with_capacity(TARGET_DIM);
    for byte in text.bytes().cycle().take(TARGET_DIM.max(text.len())) {
        state ^= byte as u64;
        state = state.wrapping_mul(1099511628211);
        v.push(((state >> 11) as f32 / u32::MAX as f32) - 0.5);
    }
    v.truncate(TARGET_DIM);
    while v.len() < TARGET_DIM {
        v.push(0.0);
    }
    normalize(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_embedder_is_unit_length_and_stable() {
        let a = DeterministicEmbedder.embed("hello world").await.unwrap();
        let b = DeterministicEmbedder.embed("hello world").await.unwrap();
        assert_eq!(a.len(), TARGET_DIM);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn different_text_gives_different_vectors() {
        let a = DeterministicEmbedder.embed("foo").await.unwrap();
        let b = DeterministicEmbedder.embed("bar").await.unwrap();
        assert_ne!(a, b);
    }
}
