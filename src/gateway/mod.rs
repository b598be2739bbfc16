//! HTTP gateway (Axum).
//!
//! Explicit route table: `/health`, `/ready`, `/query`, `/metrics`. The
//! in-flight cap is a tower concurrency limit behind a load-shedder, so
//! work above the cap is rejected with 503 instead of queueing.

#![allow(missing_docs)]

pub mod error;
pub mod handler;
pub mod state;

pub use error::ApiError;
pub use handler::query_handler;
pub use state::AppState;

use axum::{
    Json, Router,
    error_handling::HandleErrorLayer,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower::{BoxError, ServiceBuilder};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// What to do with requests arriving above the in-flight cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverloadPolicy {
    /// Shed immediately with 503.
    #[default]
    Reject,
    /// Queue on the concurrency limiter until a slot frees up.
    Queue,
}

/// Builds the router with all middleware attached.
pub fn create_router_with_state(state: AppState, max_inflight: usize) -> Router {
    create_router_with_policy(state, max_inflight, OverloadPolicy::Reject)
}

/// Builds the router with an explicit overload policy.
pub fn create_router_with_policy(
    state: AppState,
    max_inflight: usize,
    policy: OverloadPolicy,
) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/query", post(query_handler))
        .route("/metrics", get(metrics_handler));

    let router = match policy {
        OverloadPolicy::Reject => router.layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_overload))
                .load_shed()
                .concurrency_limit(max_inflight),
        ),
        OverloadPolicy::Queue => {
            router.layer(tower::limit::ConcurrencyLimitLayer::new(max_inflight))
        }
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn handle_overload(err: BoxError) -> Response {
    if err.is::<tower::load_shed::error::Overloaded>() {
        return ApiError::overloaded().into_response();
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("middleware failure: {err}"),
    )
        .into_response()
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub kv: &'static str,
    pub vectordb: &'static str,
    pub embedder: &'static str,
}

pub const STATUS_READY: &str = "ready";
pub const STATUS_ERROR: &str = "error";

/// `GET /health`: liveness only, no dependency checks.
#[tracing::instrument]
pub async fn health_handler() -> Response {
    (StatusCode::OK, Json(HealthResponse { status: "ok" })).into_response()
}

/// `GET /ready`: dependency round-trips.
#[tracing::instrument(skip(state))]
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let kv_status = if state.kv.ping().await.is_ok() {
        STATUS_READY
    } else {
        STATUS_ERROR
    };

    let vectordb_status = if state.vectordb.health_check().await.is_ok() {
        STATUS_READY
    } else {
        STATUS_ERROR
    };

    let components = ComponentStatus {
        http: STATUS_READY,
        kv: kv_status,
        vectordb: vectordb_status,
        embedder: state.embedder_name,
    };

    let is_ready =
        components.kv == STATUS_READY && components.vectordb == STATUS_READY;

    let status_code = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let status_msg = if is_ready { "ok" } else { "pending" };

    (
        status_code,
        Json(ReadyResponse {
            status: status_msg,
            components,
        }),
    )
        .into_response()
}

/// `GET /metrics`: the telemetry snapshot as JSON.
#[tracing::instrument(skip(state))]
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(state.telemetry.snapshot())).into_response()
}
