//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants from primary ones to avoid drift.
//!
//! # Key-space layout
//!
//! The KV backend is shared with the ingest worker. Prefixes reserved here
//! must stay disjoint from the ingest-owned ones (`ingest:`, `job:`).

/// Output dimension of the hosted embeddings API backend.
pub const OPENAI_EMBEDDING_DIM: usize = 1536;

/// Output dimension of the local fallback embedder.
pub const LOCAL_EMBEDDING_DIM: usize = 384;

/// Maximum number of inputs per embeddings API call.
pub const EMBED_BATCH_MAX: usize = 100;

/// Number of latency samples retained by the telemetry window.
pub const LATENCY_WINDOW: usize = 1000;

/// Hex length of the truncated cache fingerprint digest.
pub const FINGERPRINT_HEX_LEN: usize = 32;

/// Prefix of cached response keys (`cache:<rag_id>:<fingerprint>`).
pub const CACHE_KEY_PREFIX: &str = "cache:";

/// Prefix of session history keys (`session:<session_id>`).
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Prefix of token-bucket keys (`ratelimit:<rag_id>:<client>`).
pub const RATELIMIT_KEY_PREFIX: &str = "ratelimit:";

/// Idle expiry of token-bucket state, so dormant buckets self-clean.
pub const BUCKET_IDLE_TTL_SECS: u64 = 60;

/// Stored ceiling of a session list, a small multiple of typical history
/// depth. Reads trim further to the per-RAG `history_turns`.
pub const SESSION_LIST_MAX: i64 = 50;

/// Placeholder emitted when retrieval produced no usable chunks.
pub const NO_CONTEXT_PLACEHOLDER: &str = "[No relevant context found]";

/// Separator line between formatted context blocks.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Suffix appended to a `rag_id` to name its vector collection.
pub const COLLECTION_SUFFIX: &str = "_collection";

/// Returns the vector collection name owned by a RAG.
///
/// Collections are exclusive to one RAG and never shared.
pub fn collection_name(rag_id: &str) -> String {
    format!("{rag_id}{COLLECTION_SUFFIX}")
}
