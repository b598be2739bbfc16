//! Response cache.
//!
//! Completed responses are memoized in the KV backend under
//! `cache:<rag_id>:<fingerprint>` (see [`crate::hashing`]). Only the parts
//! of a response that are invocation-independent are stored; `latency_ms`,
//! `cache_hit`, and `session_id` are stamped per request by the pipeline.
//! Hits do not extend the TTL.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::hashing::cache_key;
use crate::kv::{KvError, KvStore};
use crate::pipeline::types::ContextChunk;

/// The cacheable part of a query response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedAnswer {
    /// Generated answer.
    pub answer: String,
    /// Supporting passages the answer was generated from.
    pub context_chunks: Vec<ContextChunk>,
}

/// Fingerprint-keyed memoization over the shared KV backend.
///
/// Every failure is recovered to a miss: an unreachable store must never
/// fail a query that could still be answered.
#[derive(Clone)]
pub struct ResponseCache {
    kv: Arc<dyn KvStore>,
}

impl ResponseCache {
    /// Creates a cache over `kv`.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Looks up a fingerprint. Store failures and undecodable entries
    /// degrade to `None`.
    pub async fn lookup(&self, rag_id: &str, fingerprint: &str) -> Option<CachedAnswer> {
        let key = cache_key(rag_id, fingerprint);

        let raw = match self.kv.get(&key).await {
            Ok(value) => value?,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache lookup failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(answer) => Some(answer),
            Err(e) => {
                warn!(key = %key, error = %e, "Unreadable cache entry, treating as miss");
                None
            }
        }
    }

    /// Stores an answer with the RAG's TTL. Failures are logged and
    /// swallowed; the response has already been computed.
    pub async fn store(
        &self,
        rag_id: &str,
        fingerprint: &str,
        answer: &CachedAnswer,
        ttl: Duration,
    ) {
        let key = cache_key(rag_id, fingerprint);

        let serialized = match serde_json::to_string(answer) {
            Ok(s) => s,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        if let Err(e) = self.kv.set_with_ttl(&key, &serialized, ttl).await {
            warn!(key = %key, error = %e, "Cache store failed, response not memoized");
        } else {
            debug!(key = %key, ttl_s = ttl.as_secs(), "Cached response");
        }
    }

    /// Drops every cached response of `rag_id`. Called by the ingest worker
    /// after a reingest so stale answers cannot outlive their sources.
    pub async fn invalidate_rag(&self, rag_id: &str) -> Result<u64, KvError> {
        let prefix = format!("{}{rag_id}:", crate::constants::CACHE_KEY_PREFIX);
        let deleted = self.kv.delete_prefix(&prefix).await?;
        debug!(rag_id = %rag_id, deleted = deleted, "Invalidated RAG cache entries");
        Ok(deleted)
    }
}
