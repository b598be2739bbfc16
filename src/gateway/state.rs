use std::sync::Arc;

use crate::kv::KvStore;
use crate::pipeline::QueryService;
use crate::telemetry::Telemetry;
use crate::vectordb::VectorDb;

/// Shared handler state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// The query pipeline.
    pub service: Arc<QueryService>,

    /// Telemetry surface behind `GET /metrics`.
    pub telemetry: Arc<Telemetry>,

    /// KV backend, held for readiness reporting.
    pub kv: Arc<dyn KvStore>,

    /// Vector store, held for readiness reporting.
    pub vectordb: Arc<dyn VectorDb>,

    /// Name of the selected embedding backend.
    pub embedder_name: &'static str,
}

impl AppState {
    /// Bundles the shared services.
    pub fn new(
        service: Arc<QueryService>,
        telemetry: Arc<Telemetry>,
        kv: Arc<dyn KvStore>,
        vectordb: Arc<dyn VectorDb>,
        embedder_name: &'static str,
    ) -> Self {
        Self {
            service,
            telemetry,
            kv,
            vectordb,
            embedder_name,
        }
    }
}
