//! Pipeline error taxonomy.
//!
//! Every downstream failure is translated into one of these kinds before it
//! leaves the pipeline; the gateway maps them onto HTTP statuses. Paths that
//! stay user-visible-successful (no context, provider outage with a
//! configured message) are not errors and never appear here.

use thiserror::Error;

/// Terminal pipeline failures.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The request violates the contract (e.g. out-of-range `top_k`).
    #[error("{0}")]
    Validation(String),

    /// The `rag_id` is not configured.
    #[error("unknown RAG '{rag_id}'")]
    RagNotFound {
        /// Requested tenant.
        rag_id: String,
    },

    /// The admission controller rejected the request.
    #[error("rate limit exceeded for RAG '{rag_id}'")]
    RateLimited {
        /// Throttled tenant.
        rag_id: String,
    },

    /// The embedding provider and the RAG config disagree on dimension.
    #[error("embedding misconfigured: provider produces {actual}, RAG expects {expected}")]
    EmbeddingMisconfigured {
        /// Dimension the RAG config declares.
        expected: usize,
        /// Dimension the provider produced.
        actual: usize,
    },

    /// A required backend is unreachable and no safe degradation exists.
    #[error("dependency '{component}' unavailable: {message}")]
    DependencyDown {
        /// Failing backend.
        component: &'static str,
        /// Error message.
        message: String,
    },

    /// The global request deadline elapsed.
    #[error("request deadline exceeded")]
    Timeout,

    /// Anything unexpected.
    #[error("internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// Machine-readable code surfaced in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Validation(_) => "ValidationError",
            QueryError::RagNotFound { .. } => "RAGNotFound",
            QueryError::RateLimited { .. } => "RateLimited",
            QueryError::EmbeddingMisconfigured { .. } => "EmbeddingMisconfigured",
            QueryError::DependencyDown { .. } => "DependencyDown",
            QueryError::Timeout => "Timeout",
            QueryError::Internal(_) => "Internal",
        }
    }
}
