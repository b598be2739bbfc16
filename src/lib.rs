//! # Sibyl
//!
//! Multi-tenant RAG query gateway.
//!
//! Sibyl sits between clients and an LLM provider: it retrieves the most
//! relevant passages from a per-tenant vector collection, assembles a
//! prompt, and answers with primary/fallback model orchestration.
//!
//! ```text
//! Request → Admission → Cache → Retrieval → Prompt → LLM → Response
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sibyl::Config;
//!
//! # fn run() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Listening on {}", config.socket_addr());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Purpose |
//! |---------|---------|
//! | `mock` | Mock backends for tests/examples |
//!
//! ## Modules
//!
//! - [`pipeline`] - Per-request stage orchestration
//! - [`admission`] - Per-RAG token-bucket rate limiting
//! - [`cache`] - Fingerprint-keyed response memoization
//! - [`retrieval`] - Query embedding + top-k vector search
//! - [`prompt`] - Template loading and message assembly
//! - [`llm`] - Chat completion with primary/fallback failover
//! - [`session`] - Bounded conversational history
//! - [`embedding`] - Pluggable embedding backends
//! - [`telemetry`] - Counters and latency window
//! - [`config`] - Environment + per-RAG TOML configuration
//! - [`kv`] - Shared Redis key-value backend
//! - [`vectordb`] - Qdrant integration

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod admission;
pub mod cache;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod gateway;
pub mod hashing;
pub mod kv;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;
pub mod session;
pub mod telemetry;
pub mod vectordb;

pub use admission::{AdmissionController, AdmissionDecision};
pub use cache::{CachedAnswer, ResponseCache};
pub use config::{Config, ConfigError, RagConfig, RagRegistry};
pub use embedding::{Embedder, EmbeddingError, LocalHashEmbedder, OpenAiEmbedder, select_embedder};
pub use gateway::{
    ApiError, AppState, OverloadPolicy, create_router_with_policy, create_router_with_state,
};
pub use hashing::{cache_fingerprint, normalize_question};
#[cfg(any(test, feature = "mock"))]
pub use kv::MemoryKv;
pub use kv::{KvError, KvStore, RedisKv};
#[cfg(any(test, feature = "mock"))]
pub use llm::MockChatProvider;
pub use llm::{
    ChatMessage, ChatProvider, Completion, CompletionRequest, FailoverInvoker, LlmError,
    OpenRouterConfig, OpenRouterProvider, Role,
};
pub use pipeline::{
    ClientIdentity, ContextChunk, PipelineSettings, QueryError, QueryRequest, QueryResponse,
    QueryService,
};
pub use prompt::{PromptAssembler, PromptError, format_context};
pub use retrieval::{RetrievalError, Retriever};
pub use session::{SessionStore, Turn};
pub use telemetry::{MetricsSnapshot, Telemetry};
#[cfg(any(test, feature = "mock"))]
pub use vectordb::MockVectorDb;
pub use vectordb::{ChunkPoint, QdrantDb, ScoredChunk, VectorDb, VectorDbError};
