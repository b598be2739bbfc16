use thiserror::Error;

/// Errors returned by KV store operations.
#[derive(Debug, Error)]
pub enum KvError {
    /// Could not connect to the backend.
    #[error("failed to connect to KV store at '{url}': {message}")]
    ConnectionFailed {
        /// Endpoint URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// A command failed after the connection was established.
    #[error("KV command failed for '{key}': {message}")]
    CommandFailed {
        /// Key the command addressed.
        key: String,
        /// Error message.
        message: String,
    },

    /// A stored value could not be decoded.
    #[error("failed to decode value at '{key}': {message}")]
    DecodeFailed {
        /// Key holding the value.
        key: String,
        /// Error message.
        message: String,
    },

    /// The store is deliberately unavailable (mock outage injection).
    #[error("KV store unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },
}
