//! Shared fixtures for gateway-level tests: a full router over mock
//! backends, with helpers to seed collections and issue requests.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use sibyl::config::{RagConfig, RagRegistry};
use sibyl::embedding::{Embedder, LocalHashEmbedder};
use sibyl::gateway::{AppState, create_router_with_state};
use sibyl::kv::{KvStore, MemoryKv};
use sibyl::llm::{FailoverInvoker, MockChatProvider};
use sibyl::pipeline::{PipelineSettings, QueryService};
use sibyl::telemetry::Telemetry;
use sibyl::vectordb::{ChunkPoint, MockVectorDb, VectorDb};

pub const DEFAULT_MAX_INFLIGHT: usize = 64;

/// A RAG config with templates written under `dir`, generous limits, and
/// the local embedder's dimension. Tests tweak fields before registering.
pub fn make_rag(dir: &Path, rag_id: &str) -> RagConfig {
    let system_path = dir.join(format!("{rag_id}_system.txt"));
    let user_path = dir.join(format!("{rag_id}_user.txt"));

    std::fs::File::create(&system_path)
        .unwrap()
        .write_all(b"You are a helpful assistant. Use only the provided context.")
        .unwrap();
    std::fs::File::create(&user_path)
        .unwrap()
        .write_all(b"Context:\n{context}\n\nQuestion: {question}")
        .unwrap();

    toml::from_str(&format!(
        r#"
rag_id = "{rag_id}"

[embedding]
model = "local"
dimension = 384

[limits]
rps = 1000.0
burst = 1000.0

[prompts]
system_template = "{}"
user_template = "{}"
"#,
        system_path.display(),
        user_path.display()
    ))
    .expect("valid RAG config")
}

pub struct Harness {
    pub router: Router,
    pub kv: Arc<MemoryKv>,
    pub vectordb: Arc<MockVectorDb>,
    pub embedder: Arc<LocalHashEmbedder>,
    pub telemetry: Arc<Telemetry>,
    pub registry: Arc<RagRegistry>,
    pub primary: Arc<MockChatProvider>,
    pub fallback: Arc<MockChatProvider>,
    pub tmp: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_providers(
            MockChatProvider::succeeding("primary-model", "Generated answer."),
            MockChatProvider::succeeding("fallback-model", "Fallback answer."),
        )
    }

    pub fn with_providers(primary: MockChatProvider, fallback: MockChatProvider) -> Self {
        Self::build(primary, fallback, PipelineSettings::default())
    }

    pub fn with_providers_and_settings(
        primary: MockChatProvider,
        fallback: MockChatProvider,
        settings: PipelineSettings,
    ) -> Self {
        Self::build(primary, fallback, settings)
    }

    fn build(
        primary: MockChatProvider,
        fallback: MockChatProvider,
        settings: PipelineSettings,
    ) -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let kv = Arc::new(MemoryKv::new());
        let vectordb = Arc::new(MockVectorDb::new());
        let embedder = Arc::new(LocalHashEmbedder::new());
        let telemetry = Arc::new(Telemetry::new());
        let registry = Arc::new(RagRegistry::empty());
        let primary = Arc::new(primary);
        let fallback = Arc::new(fallback);

        let llm = FailoverInvoker::new(primary.clone(), fallback.clone());
        let service = Arc::new(QueryService::new(
            registry.clone(),
            kv.clone() as Arc<dyn KvStore>,
            embedder.clone() as Arc<dyn Embedder>,
            vectordb.clone() as Arc<dyn VectorDb>,
            llm,
            telemetry.clone(),
            settings,
        ));

        let state = AppState::new(
            service,
            telemetry.clone(),
            kv.clone() as Arc<dyn KvStore>,
            vectordb.clone() as Arc<dyn VectorDb>,
            "local",
        );
        let router = create_router_with_state(state, DEFAULT_MAX_INFLIGHT);

        Self {
            router,
            kv,
            vectordb,
            embedder,
            telemetry,
            registry,
            primary,
            fallback,
            tmp,
        }
    }

    /// Registers a RAG and creates its (empty) collection.
    pub async fn add_rag(&self, config: RagConfig) {
        self.vectordb
            .ensure_collection(&config.collection_name(), config.embedding.dimension as u64)
            .await
            .expect("ensure collection");
        self.registry.insert(config);
    }

    /// Embeds and indexes `texts` into the RAG's collection.
    pub async fn seed(&self, rag_id: &str, texts: &[&str]) {
        let collection = format!("{rag_id}_collection");
        let mut points = Vec::new();
        for text in texts {
            let vector = self.embedder.embed_text(text).await.expect("embed");
            points.push(ChunkPoint::new(vector, "seed.md", *text));
        }
        self.vectordb
            .upsert(&collection, points)
            .await
            .expect("seed upsert");
    }

    pub async fn post_query(&self, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.post_query_as(body, "10.0.0.1").await
    }

    pub async fn post_query_as(
        &self,
        body: serde_json::Value,
        client_ip: &str,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/query")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", client_ip)
            .body(Body::from(body.to_string()))
            .unwrap();

        self.send(request).await
    }

    pub async fn get(&self, path: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should answer");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };

        (status, value)
    }
}
