use thiserror::Error;

/// Errors returned by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The embeddings endpoint rejected or failed the request.
    #[error("embeddings request failed: {message}")]
    RequestFailed {
        /// Error message.
        message: String,
    },

    /// The endpoint answered with a non-success status.
    #[error("embeddings endpoint returned HTTP {status}: {message}")]
    HttpStatus {
        /// Status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("invalid embeddings response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },

    /// The provider produced a vector of the wrong dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },
}
