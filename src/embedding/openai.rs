//! Hosted embeddings backend (OpenAI embeddings API).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Embedder, EmbeddingError};
use crate::constants::{EMBED_BATCH_MAX, OPENAI_EMBEDDING_DIM};

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}

/// Embeddings via the OpenAI API, 1536-dimensional output.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

impl OpenAiEmbedder {
    /// Creates a provider for `model` authenticated by `api_key`.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            url: EMBEDDINGS_URL.to_string(),
        }
    }

    /// Overrides the endpoint URL (tests and proxies).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn embed_slice(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::RequestFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::HttpStatus {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        let parsed: EmbeddingsResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::InvalidResponse {
                    message: e.to_string(),
                })?;

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse {
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    parsed.data.len()
                ),
            });
        }

        // The API is documented to return entries in input order, but it
        // also carries an index field; honor it.
        let mut data = parsed.data;
        data.sort_by_key(|entry| entry.index);

        for entry in &data {
            if entry.embedding.len() != OPENAI_EMBEDDING_DIM {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: OPENAI_EMBEDDING_DIM,
                    actual: entry.embedding.len(),
                });
            }
        }

        Ok(data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let batch = [text.to_string()];
        let mut vectors = self.embed_slice(&batch).await?;
        vectors.pop().ok_or_else(|| EmbeddingError::InvalidResponse {
            message: "empty embeddings response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(EMBED_BATCH_MAX) {
            vectors.extend(self.embed_slice(chunk).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        OPENAI_EMBEDDING_DIM
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
