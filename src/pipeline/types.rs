//! Public query contract.

use serde::{Deserialize, Serialize};

pub use crate::retrieval::ContextChunk;

/// One query as accepted by `POST /query`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// Tenant identifier.
    pub rag_id: String,
    /// Natural-language question, non-empty after trimming.
    pub question: String,
    /// Opaque session identifier; absent starts a new session.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Per-request retrieval override, `[1, max_top_k]`.
    #[serde(default)]
    pub top_k: Option<u64>,
}

/// Who is asking, as far as the HTTP layer can tell.
///
/// The admission controller keys its bucket on the IP or, when the RAG is
/// configured per-user and an identity is present, on that identity.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    /// Client IP as reported by the reverse proxy.
    pub ip: String,
    /// Authenticated identity, when a future auth layer provides one.
    pub user: Option<String>,
}

impl ClientIdentity {
    /// Identity from an IP alone.
    pub fn from_ip(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user: None,
        }
    }

    /// Selects the bucket key per the RAG's `per_ip` toggle.
    pub fn bucket_owner(&self, per_ip: bool) -> &str {
        if per_ip {
            &self.ip
        } else {
            self.user.as_deref().unwrap_or(&self.ip)
        }
    }
}

/// One answer as returned by `POST /query`. All fields are always present;
/// `context_chunks` may be empty on the no-context path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Tenant that answered.
    pub rag_id: String,
    /// Generated (or configured fallback) answer.
    pub answer: String,
    /// Supporting passages, descending score.
    pub context_chunks: Vec<ContextChunk>,
    /// Full pipeline wall-clock of this invocation, milliseconds.
    pub latency_ms: u64,
    /// Whether the answer came from the response cache.
    pub cache_hit: bool,
    /// Session the exchange belongs to (echoed or freshly assigned).
    pub session_id: String,
    /// Model that generated the answer; absent on cached and degraded
    /// answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}
