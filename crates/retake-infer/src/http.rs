//! Remote embedder for OpenAI-compatible `/v1/embeddings` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embedder::EmbedderBackend;
use retake_core::{Error, Result};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dim: usize,
    retries: usize,
}

impl HttpEmbedder {
    /// `base_url` may be the full endpoint or a server root; `/v1/embeddings`
    /// is appended when the path does not already end in `embeddings`.
    pub fn new(base_url: &str, model: &str, dim: usize) -> Result<Self> {
        let trimmed = base_url.trim_end_matches('/');
        let endpoint = if trimmed.ends_with("embeddings") {
            trimmed.to_string()
        } else {
            format!("{}/v1/embeddings", trimmed)
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            dim,
            retries: 2,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut last_err = None;
        for attempt in 0..=self.retries {
            let result = self
                .client
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match result {
                Ok(response) => {
                    let parsed: EmbeddingResponse = response
                        .json()
                        .await
                        .map_err(|e| Error::Embedding(format!("Bad embedding response: {}", e)))?;
                    return self.order_and_check(parsed, texts.len());
                }
                Err(e) => {
                    warn!("Embedding request attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e);
                }
            }
            if attempt < self.retries {
                tokio::time::sleep(Duration::from_millis(200 * (attempt as u64 + 1))).await;
            }
        }

        Err(Error::Embedding(match last_err {
            Some(e) => e.to_string(),
            None => "embedding request failed".to_string(),
        }))
    }

    fn order_and_check(&self, mut parsed: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
        if parsed.data.len() != expected {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                expected,
                parsed.data.len()
            )));
        }
        parsed
            .data
            .sort_by_key(|d| d.index.unwrap_or(usize::MAX));
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(Error::EmbeddingMismatch(format!(
                "{} returned dimension {}, configured {}",
                self.model,
                bad.len(),
                self.dim
            )));
        }
        debug!("Embedded {} texts via {}", vectors.len(), self.endpoint);
        Ok(vectors)
    }
}

#[async_trait]
impl EmbedderBackend for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Embedding("empty embedding response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn version(&self) -> String {
        format!("http/{}/{}", self.model, self.dim)
    }
}
