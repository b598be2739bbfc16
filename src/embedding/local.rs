//! Local fallback embedder.
//!
//! Hash-projection bag-of-words: each token is hashed into a bucket of a
//! fixed-size vector, accumulated, and the vector L2-normalized. No model
//! weights, no I/O, deterministic across processes. Retrieval quality is
//! far below a learned model; the point is a working service without a
//! credential.

use async_trait::async_trait;

use super::{Embedder, EmbeddingError};
use crate::constants::LOCAL_EMBEDDING_DIM;

/// Deterministic hash-projection embedder, 384-dimensional output.
#[derive(Debug, Default)]
pub struct LocalHashEmbedder;

impl LocalHashEmbedder {
    /// Creates the embedder.
    pub fn new() -> Self {
        Self
    }

    fn embed_sync(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; LOCAL_EMBEDDING_DIM];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let lower = token.to_lowercase();
            let hash = blake3::hash(lower.as_bytes());
            let bytes = hash.as_bytes();

            let bucket = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
                % LOCAL_EMBEDDING_DIM;
            // Second hash slice picks the sign so buckets don't only grow.
            let sign = if bytes[4] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
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

#[async_trait]
impl Embedder for LocalHashEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(Self::embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| Self::embed_sync(t)).collect())
    }

    fn dimension(&self) -> usize {
        LOCAL_EMBEDDING_DIM
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
