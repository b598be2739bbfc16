//! Qdrant vector database integration.
//!
//! One collection per RAG, cosine distance, chunk payloads of
//! `{source, text}`. The collection name is derived from the `rag_id`
//! (see [`crate::constants::collection_name`]).

pub mod client;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;

pub use client::{QdrantDb, VectorDb};
pub use error::VectorDbError;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockVectorDb, cosine_similarity};
pub use model::{ChunkPoint, ScoredChunk};
