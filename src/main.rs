//! Sibyl HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use sibyl::config::Config;
use sibyl::embedding::select_embedder;
use sibyl::gateway::{AppState, OverloadPolicy, create_router_with_policy};
use sibyl::kv::{KvStore, RedisKv};
use sibyl::llm::{FailoverInvoker, OpenRouterConfig, OpenRouterProvider};
use sibyl::pipeline::{PipelineSettings, QueryService};
use sibyl::telemetry::Telemetry;
use sibyl::vectordb::{QdrantDb, VectorDb};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!(
        r#"
███████╗██╗██████╗ ██╗   ██╗██╗
██╔════╝██║██╔══██╗╚██╗ ██╔╝██║
███████╗██║██████╔╝ ╚████╔╝ ██║
╚════██║██║██╔══██╗  ╚██╔╝  ██║
███████║██║██████╔╝   ██║   ███████╗
╚══════╝╚═╝╚═════╝    ╚═╝   ╚══════╝

        ASK. RETRIEVE. ANSWER.
"#
    );

    init_tracing();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        "Sibyl starting"
    );

    let registry = Arc::new(sibyl::config::RagRegistry::load(&config.rag_config_dir)?);
    let rag_ids = registry.ids();
    tracing::info!(rags = rag_ids.len(), ids = ?rag_ids, "RAG registry loaded");

    let kv: Arc<dyn KvStore> = Arc::new(RedisKv::connect(&config.redis_url).await?);
    tracing::info!(url = %config.redis_url, "KV store connected");

    let vectordb: Arc<dyn VectorDb> = Arc::new(QdrantDb::connect(&config.qdrant_url).await?);
    tracing::info!(url = %config.qdrant_url, "Vector store connected");

    // One embedding backend serves every RAG; a config that disagrees with
    // its dimension cannot produce usable queries, so boot refuses it.
    let embedding_model = registry
        .all()
        .first()
        .map(|rag| rag.embedding.model.clone())
        .unwrap_or_else(|| "text-embedding-3-small".to_string());
    let embedder = select_embedder(config.openai_api_key.as_deref(), &embedding_model);
    for rag in registry.all() {
        if rag.embedding.dimension != embedder.dimension() {
            return Err(sibyl::config::ConfigError::DimensionMismatch {
                rag_id: rag.rag_id.clone(),
                provider_dim: embedder.dimension(),
                configured_dim: rag.embedding.dimension,
            }
            .into());
        }
    }
    tracing::info!(
        backend = embedder.name(),
        dimension = embedder.dimension(),
        "Embedding provider selected"
    );

    for rag in registry.all() {
        vectordb
            .ensure_collection(&rag.collection_name(), rag.embedding.dimension as u64)
            .await?;
    }

    let api_key = config
        .openrouter_api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("OPENROUTER_API_KEY is required"))?;
    let llm_timeout = Duration::from_secs(config.llm_timeout_s);
    let primary = OpenRouterProvider::new(OpenRouterConfig::new(
        &config.llm_base_url,
        &api_key,
        &config.primary_model,
        llm_timeout,
        config.llm_max_retries,
    ))?;
    let fallback = OpenRouterProvider::new(OpenRouterConfig::new(
        &config.llm_base_url,
        &api_key,
        &config.fallback_model,
        llm_timeout,
        config.llm_max_retries,
    ))?;
    let llm = FailoverInvoker::new(Arc::new(primary), Arc::new(fallback));
    tracing::info!(
        primary = %config.primary_model,
        fallback = %config.fallback_model,
        "LLM invoker ready"
    );

    let telemetry = Arc::new(Telemetry::new());
    let embedder_name = embedder.name();
    let service = Arc::new(QueryService::new(
        Arc::clone(&registry),
        Arc::clone(&kv),
        embedder,
        Arc::clone(&vectordb),
        llm,
        Arc::clone(&telemetry),
        PipelineSettings {
            request_timeout: Duration::from_secs(config.request_timeout_s),
        },
    ));

    let state = AppState::new(service, telemetry, kv, vectordb, embedder_name);
    let policy = if config.overload_queue {
        OverloadPolicy::Queue
    } else {
        OverloadPolicy::Reject
    };
    let app = create_router_with_policy(state, config.max_inflight_requests, policy);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Sibyl shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| {
            let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
            tracing_subscriber::EnvFilter::try_new(level)
        })
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
