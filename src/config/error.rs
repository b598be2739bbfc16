//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value is outside valid range (1-65535).
    #[error("invalid port '{value}': must be between 1 and 65535")]
    InvalidPort {
        /// Original string value.
        value: String,
    },

    /// Port string could not be parsed as a number.
    #[error("failed to parse port '{value}': {source}")]
    PortParseError {
        /// Original string value.
        value: String,
        #[source]
        /// Parse error.
        source: std::num::ParseIntError,
    },

    /// Bind address string could not be parsed.
    #[error("failed to parse bind address '{value}': {source}")]
    InvalidBindAddr {
        /// Original string value.
        value: String,
        #[source]
        /// Parse error.
        source: std::net::AddrParseError,
    },

    /// A required environment variable was not set.
    #[error("missing required environment variable: {name}")]
    MissingEnvVar {
        /// Environment variable name.
        name: &'static str,
    },

    /// Path exists but is not a directory (when a directory was expected).
    #[error("path is not a directory: {path}")]
    NotADirectory {
        /// Path that was not a directory.
        path: PathBuf,
    },

    /// A per-RAG configuration file could not be read.
    #[error("failed to read RAG config '{path}': {source}")]
    RagFileRead {
        /// File that failed to read.
        path: PathBuf,
        #[source]
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A per-RAG configuration file could not be parsed.
    #[error("failed to parse RAG config '{path}': {source}")]
    RagFileParse {
        /// File that failed to parse.
        path: PathBuf,
        #[source]
        /// TOML parse error.
        source: toml::de::Error,
    },

    /// A `rag_id` contained characters outside `[A-Za-z0-9_]`.
    #[error("invalid rag_id '{rag_id}': only [A-Za-z0-9_] is allowed")]
    InvalidRagId {
        /// Offending identifier.
        rag_id: String,
    },

    /// Two RAG files declared the same `rag_id`.
    #[error("duplicate rag_id '{rag_id}' declared by {path}")]
    DuplicateRagId {
        /// Identifier declared twice.
        rag_id: String,
        /// Second file declaring it.
        path: PathBuf,
    },

    /// A per-RAG setting failed validation.
    #[error("invalid RAG config '{rag_id}': {reason}")]
    InvalidRagSetting {
        /// RAG the setting belongs to.
        rag_id: String,
        /// What was wrong.
        reason: String,
    },

    /// The embedding backend dimension does not match a RAG's configured one.
    #[error(
        "embedding dimension mismatch for '{rag_id}': provider produces {provider_dim}, \
         config expects {configured_dim}"
    )]
    DimensionMismatch {
        /// RAG whose configuration disagrees.
        rag_id: String,
        /// Dimension the selected provider produces.
        provider_dim: usize,
        /// Dimension the RAG config declares.
        configured_dim: usize,
    },
}
