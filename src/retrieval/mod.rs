//! Retrieval layer: question in, ranked context chunks out.
//!
//! Embeds the question with the process-wide provider, searches the RAG's
//! collection by cosine similarity, then applies the RAG's score threshold
//! and duplicate filter. Order is descending score throughout.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::rag::RagConfig;
use crate::embedding::{Embedder, EmbeddingError};
use crate::vectordb::{VectorDb, VectorDbError};

/// One retrieved passage, as surfaced in query responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextChunk {
    /// Opaque identifier from the vector store.
    pub id: String,
    /// Origin document.
    pub source: String,
    /// Chunk body.
    pub text: String,
    /// Similarity score in [0, 1], higher is more similar.
    pub score: f32,
}

/// Errors surfaced by retrieval.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The embedding provider failed.
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The provider's dimension does not match the RAG's configured one.
    /// This is a configuration fault, not a transient failure.
    #[error("embedding dimension mismatch: provider produces {actual}, RAG expects {expected}")]
    DimensionMismatch {
        /// Dimension the RAG config declares.
        expected: usize,
        /// Dimension the provider produced.
        actual: usize,
    },

    /// The vector store failed.
    #[error("vector search failed: {0}")]
    Search(#[from] VectorDbError),
}

/// Embedding + top-k search against the RAG's collection.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    vectordb: Arc<dyn VectorDb>,
}

impl Retriever {
    /// Creates a retriever over the shared providers.
    pub fn new(embedder: Arc<dyn Embedder>, vectordb: Arc<dyn VectorDb>) -> Self {
        Self { embedder, vectordb }
    }

    /// Returns up to `top_k` chunks for `question`, best first. An empty
    /// collection yields an empty list, not an error.
    pub async fn retrieve(
        &self,
        rag: &RagConfig,
        question: &str,
        top_k: u64,
    ) -> Result<Vec<ContextChunk>, RetrievalError> {
        let query = self.embedder.embed_text(question).await?;

        if query.len() != rag.embedding.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: rag.embedding.dimension,
                actual: query.len(),
            });
        }

        let hits = self
            .vectordb
            .search(&rag.collection_name(), query, top_k)
            .await?;

        let mut chunks: Vec<ContextChunk> = Vec::with_capacity(hits.len());
        let mut seen_texts: Vec<&str> = Vec::new();

        for hit in &hits {
            if let Some(threshold) = rag.retrieval.score_threshold {
                if hit.score < threshold {
                    continue;
                }
            }

            if rag.retrieval.filter_duplicates {
                if seen_texts.contains(&hit.text.as_str()) {
                    continue;
                }
                seen_texts.push(&hit.text);
            }

            chunks.push(ContextChunk {
                id: hit.id.clone(),
                source: hit.source.clone(),
                text: hit.text.clone(),
                score: hit.score.clamp(0.0, 1.0),
            });
        }

        debug!(
            rag_id = %rag.rag_id,
            hits = hits.len(),
            kept = chunks.len(),
            "Retrieval complete"
        );

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::LocalHashEmbedder;
    use crate::vectordb::{ChunkPoint, MockVectorDb};

    fn rag_config(threshold: Option<f32>, filter_duplicates: bool) -> RagConfig {
        let mut config: RagConfig = toml::from_str(
            r#"
rag_id = "demo"

[embedding]
model = "local"
dimension = 384

[prompts]
system_template = "system.txt"
user_template = "user.txt"
"#,
        )
        .expect("valid config");
        config.retrieval.score_threshold = threshold;
        config.retrieval.filter_duplicates = filter_duplicates;
        config
    }

    async fn seeded_retriever(texts: &[&str]) -> Retriever {
        let embedder = Arc::new(LocalHashEmbedder::new());
        let vectordb = Arc::new(MockVectorDb::new());
        vectordb
            .ensure_collection("demo_collection", 384)
            .await
            .unwrap();

        let mut points = Vec::new();
        for text in texts {
            let vector = embedder.embed_text(text).await.unwrap();
            points.push(ChunkPoint::new(vector, "doc.md", *text));
        }
        vectordb.upsert("demo_collection", points).await.unwrap();

        Retriever::new(embedder, vectordb)
    }

    #[tokio::test]
    async fn test_descending_scores_and_top_k() {
        let retriever = seeded_retriever(&[
            "rust web framework",
            "python web framework",
            "chocolate cake recipe",
        ])
        .await;

        let rag = rag_config(None, false);
        let chunks = retriever
            .retrieve(&rag, "rust web framework", 2)
            .await
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].score >= chunks[1].score);
        assert_eq!(chunks[0].text, "rust web framework");
    }

    #[tokio::test]
    async fn test_top_k_one_returns_at_most_one() {
        let retriever = seeded_retriever(&["a b c", "d e f"]).await;
        let rag = rag_config(None, false);

        let chunks = retriever.retrieve(&rag, "a b c", 1).await.unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_collection_is_empty_result() {
        let retriever = seeded_retriever(&[]).await;
        let rag = rag_config(None, false);

        let chunks = retriever.retrieve(&rag, "anything", 5).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_score_threshold_drops_weak_hits() {
        let retriever = seeded_retriever(&["rust web framework", "unrelated text entirely"]).await;
        let rag = rag_config(Some(0.9), false);

        let chunks = retriever
            .retrieve(&rag, "rust web framework", 5)
            .await
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].score >= 0.9);
    }

    #[tokio::test]
    async fn test_duplicate_filter() {
        let retriever = seeded_retriever(&["same text", "same text", "other text"]).await;
        let rag = rag_config(None, true);

        let chunks = retriever.retrieve(&rag, "same text", 5).await.unwrap();
        let same_count = chunks.iter().filter(|c| c.text == "same text").count();
        assert_eq!(same_count, 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_a_config_fault() {
        let retriever = seeded_retriever(&["anything"]).await;
        let mut rag = rag_config(None, false);
        rag.embedding.dimension = 1536;

        let result = retriever.retrieve(&rag, "q", 5).await;
        assert!(matches!(
            result,
            Err(RetrievalError::DimensionMismatch {
                expected: 1536,
                actual: 384
            })
        ));
    }

    #[tokio::test]
    async fn test_scores_are_clamped_to_unit_interval() {
        let retriever = seeded_retriever(&["alpha beta", "gamma delta"]).await;
        let rag = rag_config(None, false);

        let chunks = retriever.retrieve(&rag, "alpha beta", 5).await.unwrap();
        for chunk in chunks {
            assert!((0.0..=1.0).contains(&chunk.score));
        }
    }
}
