//! Per-RAG (tenant) configuration.
//!
//! This module is the config binder: each RAG is one TOML file in the
//! configured directory, and all parsing and validation happens here, at
//! the process edge, when [`RagRegistry::load`] or
//! [`RagRegistry::reload`] runs. Everything downstream receives validated
//! [`RagConfig`] values and never parses or re-checks them. `reload`
//! rebuilds the whole map so the ingest worker can add tenants without a
//! restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;

use super::ConfigError;
use crate::constants::collection_name;

/// Embedding settings of one RAG. The dimension is fixed for the RAG's
/// lifetime; changing it requires reingest.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSettings {
    /// Embedding model identifier.
    pub model: String,
    /// Vector dimension of the RAG's collection.
    pub dimension: usize,
}

/// Chunking settings. Owned by the ingest worker; carried here so one file
/// fully describes a tenant.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Characters per chunk.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Retrieval settings of one RAG.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Default number of chunks returned by a search.
    pub top_k: u64,
    /// Upper bound of the per-request `top_k` override.
    pub max_top_k: u64,
    /// Minimum similarity score; results below are dropped.
    pub score_threshold: Option<f32>,
    /// Drop chunks whose text is byte-identical to an earlier one.
    pub filter_duplicates: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_top_k: 20,
            score_threshold: None,
            filter_duplicates: false,
        }
    }
}

/// Prompting settings of one RAG.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptSettings {
    /// Path of the system template file.
    pub system_template: PathBuf,
    /// Path of the user template file (`{question}`/`{context}` tokens).
    pub user_template: PathBuf,
    /// Completion token budget.
    #[serde(default = "PromptSettings::default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "PromptSettings::default_temperature")]
    pub temperature: f32,
}

impl PromptSettings {
    fn default_max_tokens() -> u32 {
        512
    }

    fn default_temperature() -> f32 {
        0.2
    }
}

/// Admission settings of one RAG.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// Steady-state refill rate, tokens per second.
    pub rps: f64,
    /// Bucket capacity.
    pub burst: f64,
    /// Bucket per client IP when true, per user identity otherwise.
    pub per_ip: bool,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            rps: 5.0,
            burst: 10.0,
            per_ip: true,
        }
    }
}

/// Response-cache settings of one RAG.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether completed responses are memoized.
    pub enabled: bool,
    /// Entry lifetime. Hits do not extend it.
    pub ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 300,
        }
    }
}

/// Session settings of one RAG.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Whether conversational history is kept and replayed.
    pub enabled: bool,
    /// Sliding lifetime, renewed on each append.
    pub ttl_seconds: u64,
    /// Turns replayed into the prompt.
    pub history_turns: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 1800,
            history_turns: 6,
        }
    }
}

/// User-facing error strings of one RAG.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ErrorMessages {
    /// Answer emitted when retrieval found nothing usable.
    pub no_context_message: String,
    /// Answer emitted when primary and fallback models both failed.
    pub provider_error_message: String,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        Self {
            no_context_message: "I could not find relevant information to answer that."
                .to_string(),
            provider_error_message:
                "The answering service is temporarily unavailable. Please retry shortly."
                    .to_string(),
        }
    }
}

/// Complete configuration of one RAG tenant.
#[derive(Debug, Clone, Deserialize)]
pub struct RagConfig {
    /// Tenant identifier, `[A-Za-z0-9_]+`.
    pub rag_id: String,
    /// Embedding model and dimension.
    pub embedding: EmbeddingSettings,
    /// Ingest-owned chunking parameters.
    #[serde(default)]
    pub chunking: ChunkingSettings,
    /// Retrieval parameters.
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    /// Prompting parameters.
    pub prompts: PromptSettings,
    /// Admission parameters.
    #[serde(default)]
    pub limits: LimitSettings,
    /// Response-cache parameters.
    #[serde(default)]
    pub cache: CacheSettings,
    /// Session parameters.
    #[serde(default)]
    pub sessions: SessionSettings,
    /// User-facing error strings.
    #[serde(default)]
    pub errors: ErrorMessages,
}

impl RagConfig {
    /// Name of the vector collection owned by this RAG.
    pub fn collection_name(&self) -> String {
        collection_name(&self.rag_id)
    }

    /// Clamps a requested `top_k` override into `[1, max_top_k]`,
    /// returning `None` when it is out of range.
    pub fn effective_top_k(&self, requested: Option<u64>) -> Option<u64> {
        match requested {
            None => Some(self.retrieval.top_k),
            Some(k) if k >= 1 && k <= self.retrieval.max_top_k => Some(k),
            Some(_) => None,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_rag_id(&self.rag_id) {
            return Err(ConfigError::InvalidRagId {
                rag_id: self.rag_id.clone(),
            });
        }

        let invalid = |reason: String| ConfigError::InvalidRagSetting {
            rag_id: self.rag_id.clone(),
            reason,
        };

        if self.embedding.dimension == 0 {
            return Err(invalid("embedding.dimension must be > 0".to_string()));
        }
        if self.retrieval.top_k == 0 {
            return Err(invalid("retrieval.top_k must be >= 1".to_string()));
        }
        if self.retrieval.top_k > self.retrieval.max_top_k {
            return Err(invalid(format!(
                "retrieval.top_k ({}) exceeds max_top_k ({})",
                self.retrieval.top_k, self.retrieval.max_top_k
            )));
        }
        if self.limits.rps <= 0.0 {
            return Err(invalid("limits.rps must be > 0".to_string()));
        }
        if self.limits.burst < 1.0 {
            return Err(invalid("limits.burst must be >= 1".to_string()));
        }
        if self.cache.enabled && self.cache.ttl_seconds == 0 {
            return Err(invalid("cache.ttl_seconds must be > 0".to_string()));
        }
        if self.sessions.enabled && self.sessions.ttl_seconds == 0 {
            return Err(invalid("sessions.ttl_seconds must be > 0".to_string()));
        }

        Ok(())
    }
}

/// Returns `true` when `rag_id` matches `[A-Za-z0-9_]+`.
pub fn is_valid_rag_id(rag_id: &str) -> bool {
    !rag_id.is_empty()
        && rag_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Startup-loaded map of `rag_id` to configuration.
///
/// `get` hands out `Arc`s so a reload never invalidates configs held by
/// in-flight requests.
#[derive(Debug)]
pub struct RagRegistry {
    dir: PathBuf,
    rags: RwLock<HashMap<String, Arc<RagConfig>>>,
}

impl RagRegistry {
    /// Loads every `*.toml` file under `dir`.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let dir = dir.into();
        let rags = Self::read_dir(&dir)?;
        Ok(Self {
            dir,
            rags: RwLock::new(rags),
        })
    }

    /// Creates an empty registry (tests and tooling).
    pub fn empty() -> Self {
        Self {
            dir: PathBuf::new(),
            rags: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a config directly, bypassing the filesystem (tests).
    pub fn insert(&self, config: RagConfig) {
        self.rags
            .write()
            .insert(config.rag_id.clone(), Arc::new(config));
    }

    /// Returns the config of `rag_id`, if known.
    pub fn get(&self, rag_id: &str) -> Option<Arc<RagConfig>> {
        self.rags.read().get(rag_id).cloned()
    }

    /// Returns the known tenant identifiers, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rags.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns every loaded config.
    pub fn all(&self) -> Vec<Arc<RagConfig>> {
        self.rags.read().values().cloned().collect()
    }

    /// Re-reads the config directory and swaps the map wholesale.
    pub fn reload(&self) -> Result<usize, ConfigError> {
        let fresh = Self::read_dir(&self.dir)?;
        let count = fresh.len();
        *self.rags.write() = fresh;
        Ok(count)
    }

    fn read_dir(dir: &Path) -> Result<HashMap<String, Arc<RagConfig>>, ConfigError> {
        let mut rags = HashMap::new();

        if !dir.exists() {
            tracing::warn!(dir = %dir.display(), "RAG config directory missing, starting empty");
            return Ok(rags);
        }

        let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::RagFileRead {
            path: dir.to_path_buf(),
            source: e,
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "toml") {
                continue;
            }

            let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::RagFileRead {
                path: path.clone(),
                source: e,
            })?;
            let config: RagConfig =
                toml::from_str(&raw).map_err(|e| ConfigError::RagFileParse {
                    path: path.clone(),
                    source: e,
                })?;
            config.validate()?;

            if rags.contains_key(&config.rag_id) {
                return Err(ConfigError::DuplicateRagId {
                    rag_id: config.rag_id,
                    path,
                });
            }

            tracing::debug!(rag_id = %config.rag_id, path = %path.display(), "Loaded RAG config");
            rags.insert(config.rag_id.clone(), Arc::new(config));
        }

        Ok(rags)
    }
}
