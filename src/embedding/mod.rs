//! Embedding providers.
//!
//! A single provider is selected at startup and shared by every RAG: the
//! hosted OpenAI embeddings API when a credential is configured, otherwise
//! the deterministic local fallback. The selected dimension must match every
//! RAG's configured dimension; that check happens at boot, not per request.

pub mod error;
pub mod local;
pub mod openai;

pub use error::EmbeddingError;
pub use local::LocalHashEmbedder;
pub use openai::OpenAiEmbedder;

use std::sync::Arc;

use async_trait::async_trait;

/// Converts text into dense vectors of a fixed dimension.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a single text.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds a batch, preserving input order in the output.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Fixed output dimension.
    fn dimension(&self) -> usize;

    /// Human-readable backend name, used by readiness reporting.
    fn name(&self) -> &'static str;
}

/// Selects the embedding backend from the configured credential.
///
/// With `OPENAI_API_KEY` set the hosted API is used; otherwise the local
/// fallback, which produces smaller vectors and exists so the service can
/// run without an external dependency.
pub fn select_embedder(openai_api_key: Option<&str>, model: &str) -> Arc<dyn Embedder> {
    match openai_api_key {
        Some(key) => Arc::new(OpenAiEmbedder::new(key, model)),
        None => {
            tracing::warn!("No OPENAI_API_KEY configured, using local fallback embedder");
            Arc::new(LocalHashEmbedder::new())
        }
    }
}
