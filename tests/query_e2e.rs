//! End-to-end scenarios through the HTTP router with mock backends.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use common::{Harness, make_rag};
use sibyl::llm::MockChatProvider;
use sibyl::pipeline::PipelineSettings;

const DEMO_CHUNKS: &[&str] = &[
    "FastAPI is a modern Python web framework for building APIs.",
    "FastAPI is built on Starlette and Pydantic.",
    "Uvicorn is an ASGI server commonly used to run FastAPI.",
];

async fn demo_harness() -> Harness {
    let harness = Harness::new();
    let mut rag = make_rag(harness.tmp.path(), "demo");
    rag.cache.ttl_seconds = 60;
    harness.add_rag(rag).await;
    harness.seed("demo", DEMO_CHUNKS).await;
    harness
}

#[tokio::test]
async fn scenario_cold_then_cache_hit() {
    let harness = demo_harness().await;
    let body = json!({"rag_id": "demo", "question": "What is FastAPI?"});

    let (status, first) = harness.post_query(body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["rag_id"], "demo");
    assert_eq!(first["cache_hit"], false);
    assert_eq!(first["answer"], "Generated answer.");
    assert!(!first["context_chunks"].as_array().unwrap().is_empty());
    assert_eq!(first["model_used"], "primary-model");

    let (status, second) = harness.post_query(body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cache_hit"], true);
    assert_eq!(second["answer"], first["answer"]);
    assert_eq!(second["context_chunks"], first["context_chunks"]);
    assert!(second["latency_ms"].as_u64().unwrap() <= 50);
    // Cached answers do not re-report a model.
    assert!(second.get("model_used").is_none());

    // The provider answered exactly once.
    assert_eq!(harness.primary.calls(), 1);
}

#[tokio::test]
async fn scenario_no_context_path() {
    let harness = Harness::new();
    harness
        .add_rag(make_rag(harness.tmp.path(), "empty"))
        .await;

    let (status, body) = harness
        .post_query(json!({"rag_id": "empty", "question": "anything"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["answer"],
        "I could not find relevant information to answer that."
    );
    assert_eq!(body["context_chunks"], json!([]));
    assert_eq!(body["cache_hit"], false);
    assert_eq!(harness.primary.calls(), 0);
}

#[tokio::test]
async fn scenario_rate_limit_rejection_and_recovery() {
    let harness = Harness::new();
    let mut rag = make_rag(harness.tmp.path(), "limited");
    rag.limits.rps = 1.0;
    rag.limits.burst = 1.0;
    harness.add_rag(rag).await;
    harness.seed("limited", DEMO_CHUNKS).await;

    let body = json!({"rag_id": "limited", "question": "What is FastAPI?"});

    let (s1, _) = harness.post_query_as(body.clone(), "10.9.9.9").await;
    let (s2, e2) = harness.post_query_as(body.clone(), "10.9.9.9").await;
    let (s3, e3) = harness.post_query_as(body.clone(), "10.9.9.9").await;

    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(e2["code"], "RateLimited");
    assert_eq!(s3, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(e3["code"], "RateLimited");

    // After 1/rps seconds the bucket holds a token again. Admission runs
    // before the cache lookup, so a rejection cannot be masked by a hit.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let (s4, _) = harness.post_query_as(body, "10.9.9.9").await;
    assert_eq!(s4, StatusCode::OK);

    let snapshot = harness.telemetry.snapshot();
    assert_eq!(snapshot.rate_limited_total, 2);
    assert_eq!(snapshot.requests_total, 4);
    // Rejections are not errors.
    assert_eq!(snapshot.errors_total, 0);
}

#[tokio::test]
async fn scenario_fallback_on_permanent_primary_rejection() {
    // A known-invalid primary model id: the endpoint answers HTTP 400,
    // which is permanent and must not be retried against the primary.
    let harness = Harness::with_providers(
        MockChatProvider::failing_rejected("broken-model", 400),
        MockChatProvider::succeeding("fallback-model", "Rescued answer."),
    );
    harness.add_rag(make_rag(harness.tmp.path(), "demo")).await;
    harness.seed("demo", DEMO_CHUNKS).await;

    let (status, body) = harness
        .post_query(json!({"rag_id": "demo", "question": "What is FastAPI?"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Rescued answer.");
    assert_eq!(body["model_used"], "fallback-model");
    assert_eq!(harness.primary.calls(), 1);
    assert_eq!(harness.fallback.calls(), 1);

    assert_eq!(harness.telemetry.snapshot().errors_total, 0);
}

#[tokio::test]
async fn scenario_unknown_rag() {
    let harness = Harness::new();

    let (status, body) = harness
        .post_query(json!({"rag_id": "nope", "question": "x"}))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "RAGNotFound");
    assert!(body["message"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn scenario_metrics_consistency() {
    let harness = demo_harness().await;

    for i in 0..10 {
        let (status, _) = harness
            .post_query(json!({"rag_id": "demo", "question": format!("distinct question {i}")}))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    for _ in 0..3 {
        let (status, body) = harness
            .post_query(json!({"rag_id": "demo", "question": "distinct question 0"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cache_hit"], true);
    }

    let (status, metrics) = harness.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["requests_total"], 13);
    assert_eq!(metrics["cache_hits_total"], 3);
    assert_eq!(metrics["latency_samples"], 13);
    assert!(metrics["p95_latency_ms"].as_f64().unwrap() >= metrics["avg_latency_ms"].as_f64().unwrap());

    let keys: Vec<&str> = metrics.as_object().unwrap().keys().map(|k| k.as_str()).collect();
    for key in [
        "requests_total",
        "errors_total",
        "cache_hits_total",
        "rate_limited_total",
        "avg_latency_ms",
        "p95_latency_ms",
        "latency_samples",
    ] {
        assert!(keys.contains(&key), "missing metrics key {key}");
    }
    assert_eq!(keys.len(), 7);
}

#[tokio::test]
async fn concurrent_identical_requests_all_complete() {
    let harness = std::sync::Arc::new(demo_harness().await);

    // Two identical in-flight requests may both miss and both write the
    // same key; the second write wins and both callers get an answer.
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let harness = harness.clone();
            tokio::spawn(async move {
                let question = if i % 2 == 0 {
                    "What is FastAPI?"
                } else {
                    "What runs FastAPI?"
                };
                harness
                    .post_query(json!({"rag_id": "demo", "question": question}))
                    .await
            })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    for result in results {
        let (status, body) = result.expect("task should not panic");
        assert_eq!(status, StatusCode::OK);
        assert!(!body["answer"].as_str().unwrap().is_empty());
    }

    let snapshot = harness.telemetry.snapshot();
    assert_eq!(snapshot.requests_total, 10);
    assert_eq!(snapshot.latency_samples, 10);
}

#[tokio::test]
async fn health_endpoint() {
    let harness = Harness::new();
    let (status, body) = harness.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn ready_endpoint_reports_components() {
    let harness = Harness::new();
    let (status, body) = harness.get("/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["components"]["kv"], "ready");
    assert_eq!(body["components"]["vectordb"], "ready");
    assert_eq!(body["components"]["embedder"], "local");

    harness.kv.set_unavailable(true);
    let (status, body) = harness.get("/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["components"]["kv"], "error");
}

#[tokio::test]
async fn validation_empty_question_is_400() {
    let harness = demo_harness().await;

    let (status, body) = harness
        .post_query(json!({"rag_id": "demo", "question": ""}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");
}

#[tokio::test]
async fn validation_malformed_body_is_400() {
    let harness = demo_harness().await;

    let (status, body) = harness.post_query(json!({"question": "no rag_id"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");
}

#[tokio::test]
async fn validation_top_k_out_of_range_is_400() {
    let harness = demo_harness().await;

    let (status, body) = harness
        .post_query(json!({"rag_id": "demo", "question": "q", "top_k": 0}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");

    // Above the per-RAG maximum (20).
    let (status, body) = harness
        .post_query(json!({"rag_id": "demo", "question": "q", "top_k": 21}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");
}

#[tokio::test]
async fn session_id_is_echoed_or_assigned() {
    let harness = demo_harness().await;

    let (_, body) = harness
        .post_query(json!({"rag_id": "demo", "question": "What is FastAPI?"}))
        .await;
    let assigned = body["session_id"].as_str().unwrap();
    assert!(!assigned.is_empty());

    let (_, body) = harness
        .post_query(json!({
            "rag_id": "demo",
            "question": "And what is Uvicorn?",
            "session_id": "my-session"
        }))
        .await;
    assert_eq!(body["session_id"], "my-session");
}

#[tokio::test]
async fn session_history_reaches_the_prompt() {
    let harness = demo_harness().await;

    harness
        .post_query(json!({
            "rag_id": "demo",
            "question": "What is FastAPI?",
            "session_id": "s-hist"
        }))
        .await;

    harness
        .post_query(json!({
            "rag_id": "demo",
            "question": "What server runs it?",
            "session_id": "s-hist"
        }))
        .await;

    let request = harness.primary.last_request().expect("provider called");
    // system + prior user/assistant pair + current user question.
    assert_eq!(request.messages.len(), 4);
    assert_eq!(request.messages[1].content, "What is FastAPI?");
    assert_eq!(request.messages[2].content, "Generated answer.");
    assert!(request.messages[3].content.contains("What server runs it?"));
}

#[tokio::test]
async fn context_chunks_are_sorted_descending() {
    let harness = demo_harness().await;

    let (_, body) = harness
        .post_query(json!({"rag_id": "demo", "question": "What is FastAPI?", "top_k": 3}))
        .await;

    let chunks = body["context_chunks"].as_array().unwrap();
    assert!(!chunks.is_empty());
    let scores: Vec<f64> = chunks
        .iter()
        .map(|c| c["score"].as_f64().unwrap())
        .collect();
    for pair in scores.windows(2) {
        assert!(pair[0] >= pair[1]);
    }
}

#[tokio::test]
async fn kv_outage_degrades_instead_of_failing() {
    let harness = demo_harness().await;
    harness.kv.set_unavailable(true);

    // Admission, cache, and sessions are all down; the query still answers.
    let (status, body) = harness
        .post_query(json!({"rag_id": "demo", "question": "What is FastAPI?"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Generated answer.");
    assert_eq!(body["cache_hit"], false);
    assert_eq!(harness.telemetry.snapshot().errors_total, 0);
}

#[tokio::test]
async fn provider_outage_surfaces_configured_message() {
    let harness = Harness::with_providers(
        MockChatProvider::failing_upstream("primary-model"),
        MockChatProvider::failing_upstream("fallback-model"),
    );
    let mut rag = make_rag(harness.tmp.path(), "demo");
    rag.errors.provider_error_message = "Please try again later.".to_string();
    harness.add_rag(rag).await;
    harness.seed("demo", DEMO_CHUNKS).await;

    let question = json!({"rag_id": "demo", "question": "What is FastAPI?"});
    let (status, body) = harness.post_query(question.clone()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Please try again later.");
    assert!(body.get("model_used").is_none());
    assert_eq!(harness.telemetry.snapshot().errors_total, 1);

    // Failures are not cached: the next identical request is a miss.
    let (_, body) = harness.post_query(question).await;
    assert_eq!(body["cache_hit"], false);
    assert_eq!(harness.telemetry.snapshot().errors_total, 2);
}

#[tokio::test]
async fn global_timeout_returns_504() {
    let harness = Harness::with_providers_and_settings(
        MockChatProvider::succeeding_after_delay(
            "primary-model",
            "too late",
            Duration::from_millis(500),
        ),
        MockChatProvider::succeeding_after_delay(
            "fallback-model",
            "too late",
            Duration::from_millis(500),
        ),
        PipelineSettings {
            request_timeout: Duration::from_millis(50),
        },
    );
    let rag = make_rag(harness.tmp.path(), "demo");
    harness.add_rag(rag).await;
    harness.seed("demo", DEMO_CHUNKS).await;

    let (status, body) = harness
        .post_query(json!({"rag_id": "demo", "question": "What is FastAPI?"}))
        .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], "Timeout");
    let snapshot = harness.telemetry.snapshot();
    assert_eq!(snapshot.errors_total, 1);
    assert_eq!(snapshot.latency_samples, 1);
}

#[tokio::test]
async fn cache_disabled_rag_always_misses() {
    let harness = Harness::new();
    let mut rag = make_rag(harness.tmp.path(), "nocache");
    rag.cache.enabled = false;
    harness.add_rag(rag).await;
    harness.seed("nocache", DEMO_CHUNKS).await;

    let body = json!({"rag_id": "nocache", "question": "What is FastAPI?"});
    harness.post_query(body.clone()).await;
    let (_, second) = harness.post_query(body).await;

    assert_eq!(second["cache_hit"], false);
    assert_eq!(harness.primary.calls(), 2);
    assert_eq!(harness.telemetry.snapshot().cache_hits_total, 0);
}

#[tokio::test]
async fn cache_invalidation_forces_recompute() {
    let harness = demo_harness().await;
    let body = json!({"rag_id": "demo", "question": "What is FastAPI?"});

    harness.post_query(body.clone()).await;
    let (_, hit) = harness.post_query(body.clone()).await;
    assert_eq!(hit["cache_hit"], true);

    // The ingest worker invalidates after a reingest, reaching the cache
    // through its own handle over the same KV.
    let cache = sibyl::cache::ResponseCache::new(
        harness.kv.clone() as std::sync::Arc<dyn sibyl::kv::KvStore>
    );
    let deleted = cache.invalidate_rag("demo").await.unwrap();
    assert_eq!(deleted, 1);

    let (_, after) = harness.post_query(body).await;
    assert_eq!(after["cache_hit"], false);
}
