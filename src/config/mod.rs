//! Environment-backed service configuration.
//!
//! The service-level knobs come from the environment; per-RAG settings come
//! from TOML files in [`Config::rag_config_dir`] (see [`rag`]). Environment
//! values override file values.

pub mod error;
pub mod rag;


pub use error::ConfigError;
pub use rag::{RagConfig, RagRegistry};

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

/// Service-level configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,

    /// HTTP bind address.
    pub bind_addr: IpAddr,

    /// Qdrant endpoint URL.
    pub qdrant_url: String,

    /// Redis endpoint URL.
    pub redis_url: String,

    /// Chat-completions credential. Absent means the invoker cannot boot.
    pub openrouter_api_key: Option<String>,

    /// Embeddings credential. Absent selects the local fallback embedder.
    pub openai_api_key: Option<String>,

    /// Directory of per-RAG TOML files.
    pub rag_config_dir: PathBuf,

    /// RAG the proxy tier substitutes when a request names none.
    pub default_rag: Option<String>,

    /// Wall-clock budget of a whole query request, in seconds.
    pub request_timeout_s: u64,

    /// Cap on concurrently admitted requests; excess is shed with 503.
    pub max_inflight_requests: usize,

    /// Queue above the cap instead of shedding.
    pub overload_queue: bool,

    /// Primary chat model identifier.
    pub primary_model: String,

    /// Fallback chat model identifier.
    pub fallback_model: String,

    /// Chat-completions endpoint base URL.
    pub llm_base_url: String,

    /// Per-call timeout of one chat completion attempt, in seconds.
    pub llm_timeout_s: u64,

    /// Retry budget per model before failing over.
    pub llm_max_retries: u32,
}

/// Default Qdrant endpoint.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Default Redis endpoint.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default chat-completions endpoint.
pub const DEFAULT_LLM_BASE_URL: &str = "https://openrouter.ai/api";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            openrouter_api_key: None,
            openai_api_key: None,
            rag_config_dir: PathBuf::from("./rags"),
            default_rag: None,
            request_timeout_s: 60,
            max_inflight_requests: 256,
            overload_queue: false,
            primary_model: "openai/gpt-4o-mini".to_string(),
            fallback_model: "meta-llama/llama-3.1-8b-instruct".to_string(),
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_timeout_s: 30,
            llm_max_retries: 2,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "SIBYL_PORT";
    const ENV_BIND_ADDR: &'static str = "SIBYL_BIND_ADDR";
    const ENV_QDRANT_URL: &'static str = "QDRANT_URL";
    const ENV_REDIS_URL: &'static str = "REDIS_URL";
    const ENV_OPENROUTER_API_KEY: &'static str = "OPENROUTER_API_KEY";
    const ENV_OPENAI_API_KEY: &'static str = "OPENAI_API_KEY";
    const ENV_RAG_CONFIG_DIR: &'static str = "RAG_CONFIG_DIR";
    const ENV_DEFAULT_RAG: &'static str = "DEFAULT_RAG";
    const ENV_REQUEST_TIMEOUT_S: &'static str = "SIBYL_REQUEST_TIMEOUT_S";
    const ENV_MAX_INFLIGHT: &'static str = "SIBYL_MAX_INFLIGHT_REQUESTS";
    const ENV_OVERLOAD_QUEUE: &'static str = "SIBYL_OVERLOAD_QUEUE";
    const ENV_PRIMARY_MODEL: &'static str = "SIBYL_PRIMARY_MODEL";
    const ENV_FALLBACK_MODEL: &'static str = "SIBYL_FALLBACK_MODEL";
    const ENV_LLM_BASE_URL: &'static str = "SIBYL_LLM_BASE_URL";
    const ENV_LLM_TIMEOUT_S: &'static str = "SIBYL_LLM_TIMEOUT_S";
    const ENV_LLM_MAX_RETRIES: &'static str = "SIBYL_LLM_MAX_RETRIES";

    /// Reads the configuration from the environment, filling gaps from
    /// [`Config::default`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let qdrant_url = Self::parse_string_from_env(Self::ENV_QDRANT_URL, defaults.qdrant_url);
        let redis_url = Self::parse_string_from_env(Self::ENV_REDIS_URL, defaults.redis_url);
        let openrouter_api_key = Self::parse_optional_from_env(Self::ENV_OPENROUTER_API_KEY);
        let openai_api_key = Self::parse_optional_from_env(Self::ENV_OPENAI_API_KEY);
        let rag_config_dir =
            Self::parse_path_from_env(Self::ENV_RAG_CONFIG_DIR, defaults.rag_config_dir);
        let default_rag = Self::parse_optional_from_env(Self::ENV_DEFAULT_RAG);
        let request_timeout_s =
            Self::parse_u64_from_env(Self::ENV_REQUEST_TIMEOUT_S, defaults.request_timeout_s);
        let max_inflight_requests = Self::parse_u64_from_env(
            Self::ENV_MAX_INFLIGHT,
            defaults.max_inflight_requests as u64,
        ) as usize;
        let overload_queue =
            Self::parse_bool_from_env(Self::ENV_OVERLOAD_QUEUE, defaults.overload_queue);
        let primary_model =
            Self::parse_string_from_env(Self::ENV_PRIMARY_MODEL, defaults.primary_model);
        let fallback_model =
            Self::parse_string_from_env(Self::ENV_FALLBACK_MODEL, defaults.fallback_model);
        let llm_base_url =
            Self::parse_string_from_env(Self::ENV_LLM_BASE_URL, defaults.llm_base_url);
        let llm_timeout_s =
            Self::parse_u64_from_env(Self::ENV_LLM_TIMEOUT_S, defaults.llm_timeout_s);
        let llm_max_retries =
            Self::parse_u64_from_env(Self::ENV_LLM_MAX_RETRIES, defaults.llm_max_retries as u64)
                as u32;

        Ok(Self {
            port,
            bind_addr,
            qdrant_url,
            redis_url,
            openrouter_api_key,
            openai_api_key,
            rag_config_dir,
            default_rag,
            request_timeout_s,
            max_inflight_requests,
            overload_queue,
            primary_model,
            fallback_model,
            llm_base_url,
            llm_timeout_s,
            llm_max_retries,
        })
    }

    /// Validates settings that can only be checked against the filesystem
    /// or against each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rag_config_dir.exists() && !self.rag_config_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.rag_config_dir.clone(),
            });
        }

        if self.openrouter_api_key.is_none() {
            return Err(ConfigError::MissingEnvVar {
                name: Self::ENV_OPENROUTER_API_KEY,
            });
        }

        Ok(())
    }

    /// Returns the `host:port` string to bind.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_bool_from_env(var_name: &str, default: bool) -> bool {
        env::var(var_name)
            .ok()
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(default)
    }
}
