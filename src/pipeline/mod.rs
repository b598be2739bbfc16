//! Request pipeline.
//!
//! [`QueryService`] owns the per-request stage order: resolve RAG →
//! admission → session assignment → cache lookup → retrieval → prompt
//! assembly → LLM with failover → cache store + session append. It is the
//! only place that constructs terminal [`QueryResponse`]s, and no error from
//! a downstream component escapes it untranslated.
//!
//! Degradation policy: cache and session failures are recovered locally,
//! admission degrades to admit, and a full provider outage answers with the
//! RAG's configured message strings instead of an error status.

pub mod error;
pub mod types;

pub use error::QueryError;
pub use types::{ClientIdentity, ContextChunk, QueryRequest, QueryResponse};

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::admission::{AdmissionController, AdmissionDecision};
use crate::cache::{CachedAnswer, ResponseCache};
use crate::config::rag::RagConfig;
use crate::config::RagRegistry;
use crate::embedding::Embedder;
use crate::kv::KvStore;
use crate::llm::{CompletionRequest, FailoverInvoker};
use crate::prompt::PromptAssembler;
use crate::retrieval::{RetrievalError, Retriever};
use crate::session::SessionStore;
use crate::telemetry::Telemetry;
use crate::vectordb::VectorDb;

/// Pipeline-wide settings, independent of any RAG.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Wall-clock budget of one request; every downstream call runs under
    /// what remains of it.
    pub request_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Remaining-budget tracker for per-operation timeouts.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
}

impl Deadline {
    fn new(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

/// Runs `fut` under what remains of the request budget.
async fn bounded<T>(deadline: Deadline, fut: impl Future<Output = T> + Send) -> Result<T, QueryError> {
    tokio::time::timeout(deadline.remaining(), fut)
        .await
        .map_err(|_| QueryError::Timeout)
}

/// The query-serving dataplane.
pub struct QueryService {
    rags: Arc<RagRegistry>,
    admission: AdmissionController,
    cache: ResponseCache,
    sessions: SessionStore,
    retriever: Retriever,
    prompts: PromptAssembler,
    llm: FailoverInvoker,
    telemetry: Arc<Telemetry>,
    settings: PipelineSettings,
}

impl QueryService {
    /// Wires the pipeline from its external backends. This is the only
    /// place the sub-components are constructed.
    pub fn new(
        rags: Arc<RagRegistry>,
        kv: Arc<dyn KvStore>,
        embedder: Arc<dyn Embedder>,
        vectordb: Arc<dyn VectorDb>,
        llm: FailoverInvoker,
        telemetry: Arc<Telemetry>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            rags,
            admission: AdmissionController::new(Arc::clone(&kv)),
            cache: ResponseCache::new(Arc::clone(&kv)),
            sessions: SessionStore::new(Arc::clone(&kv)),
            retriever: Retriever::new(embedder, vectordb),
            prompts: PromptAssembler::new(),
            llm,
            telemetry,
            settings,
        }
    }

    /// The response cache, exposed for the ingest worker's invalidation
    /// call and for tooling.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// The tenant registry.
    pub fn rags(&self) -> &RagRegistry {
        &self.rags
    }

    /// Serves one query to completion.
    ///
    /// Telemetry contract: `requests_total` increments exactly once per
    /// call, latency is recorded exactly once per call (hits and error
    /// paths included), `errors_total` on every non-success terminal except
    /// rate-limit rejections, which have their own counter.
    #[instrument(skip(self, request, client), fields(rag_id = %request.rag_id, cache = tracing::field::Empty))]
    pub async fn query(
        &self,
        request: QueryRequest,
        client: &ClientIdentity,
    ) -> Result<QueryResponse, QueryError> {
        self.telemetry.record_request();
        let started = Instant::now();
        let deadline = Deadline::new(self.settings.request_timeout);

        let result = self.run(&request, client, started, deadline).await;

        self.telemetry
            .record_latency(started.elapsed().as_secs_f64() * 1000.0);
        match &result {
            Ok(_) => {}
            Err(QueryError::RateLimited { .. }) => self.telemetry.record_rate_limited(),
            Err(_) => self.telemetry.record_error(),
        }

        result
    }

    async fn run(
        &self,
        request: &QueryRequest,
        client: &ClientIdentity,
        started: Instant,
        deadline: Deadline,
    ) -> Result<QueryResponse, QueryError> {
        // Stage 1: resolve the tenant.
        let rag = self
            .rags
            .get(&request.rag_id)
            .ok_or_else(|| QueryError::RagNotFound {
                rag_id: request.rag_id.clone(),
            })?;

        // Stage 2: admission.
        let owner = client.bucket_owner(rag.limits.per_ip);
        let decision = bounded(
            deadline,
            self.admission.check(&rag.rag_id, owner, &rag.limits),
        )
        .await?;
        if decision == AdmissionDecision::Rejected {
            debug!(client = %owner, "Request rejected by admission");
            return Err(QueryError::RateLimited {
                rag_id: rag.rag_id.clone(),
            });
        }

        // Stage 3: session assignment.
        let session_id = request
            .session_id
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(SessionStore::new_session_id);

        // Stage 4: cache lookup.
        let top_k = rag
            .effective_top_k(request.top_k)
            .ok_or_else(|| {
                QueryError::Validation(format!(
                    "top_k must be between 1 and {}",
                    rag.retrieval.max_top_k
                ))
            })?;
        let fingerprint = crate::hashing::cache_fingerprint(&rag.rag_id, &request.question, top_k);

        if rag.cache.enabled {
            if let Some(hit) = bounded(deadline, self.cache.lookup(&rag.rag_id, &fingerprint)).await?
            {
                self.telemetry.record_cache_hit();
                tracing::Span::current().record("cache", "hit");
                info!("Cache hit");
                return Ok(self.terminal(&rag, hit, started, true, session_id, None));
            }
        }
        tracing::Span::current().record("cache", "miss");

        // Stage 5: retrieval.
        let chunks = bounded(
            deadline,
            self.retriever.retrieve(&rag, &request.question, top_k),
        )
        .await?
        .map_err(|e| match e {
            RetrievalError::DimensionMismatch { expected, actual } => {
                QueryError::EmbeddingMisconfigured { expected, actual }
            }
            RetrievalError::Embedding(e) => QueryError::DependencyDown {
                component: "embedding",
                message: e.to_string(),
            },
            RetrievalError::Search(e) => QueryError::DependencyDown {
                component: "vectordb",
                message: e.to_string(),
            },
        })?;

        if chunks.is_empty() {
            debug!("No usable context, skipping LLM");
            let answer = CachedAnswer {
                answer: rag.errors.no_context_message.clone(),
                context_chunks: Vec::new(),
            };
            self.commit(&rag, &fingerprint, &answer, &session_id, &request.question, deadline)
                .await?;
            return Ok(self.terminal(&rag, answer, started, false, session_id, None));
        }

        // Stage 6: prompt assembly, including session history.
        let history = if rag.sessions.enabled {
            match bounded(
                deadline,
                self.sessions
                    .get_history(&session_id, rag.sessions.history_turns),
            )
            .await?
            {
                Ok(history) => history,
                Err(e) => {
                    warn!(error = %e, "Session history unavailable, continuing without");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let messages = self
            .prompts
            .build_messages(&rag, &request.question, &chunks, &history)
            .map_err(|e| QueryError::Internal(e.to_string()))?;

        // Stage 7: LLM with failover.
        let completion_request = CompletionRequest {
            messages,
            max_tokens: rag.prompts.max_tokens,
            temperature: rag.prompts.temperature,
        };
        let completion = match bounded(deadline, self.llm.complete(&completion_request)).await? {
            Ok(completion) => completion,
            Err(e) => {
                // Both models failed: surface the configured message as the
                // answer, count the error, cache nothing.
                warn!(error = %e, "All models failed, answering with configured message");
                self.telemetry.record_error();
                let answer = CachedAnswer {
                    answer: rag.errors.provider_error_message.clone(),
                    context_chunks: chunks,
                };
                return Ok(self.terminal(&rag, answer, started, false, session_id, None));
            }
        };

        info!(model = %completion.model, "Answer generated");

        // Stage 8: memoize and extend the conversation.
        let answer = CachedAnswer {
            answer: completion.content,
            context_chunks: chunks,
        };
        self.commit(&rag, &fingerprint, &answer, &session_id, &request.question, deadline)
            .await?;

        Ok(self.terminal(
            &rag,
            answer,
            started,
            false,
            session_id,
            Some(completion.model),
        ))
    }

    /// Cache store + session append for a completed answer. Both are
    /// best-effort; only deadline exhaustion escapes.
    async fn commit(
        &self,
        rag: &RagConfig,
        fingerprint: &str,
        answer: &CachedAnswer,
        session_id: &str,
        question: &str,
        deadline: Deadline,
    ) -> Result<(), QueryError> {
        if rag.cache.enabled {
            bounded(
                deadline,
                self.cache.store(
                    &rag.rag_id,
                    fingerprint,
                    answer,
                    Duration::from_secs(rag.cache.ttl_seconds),
                ),
            )
            .await?;
        }

        if rag.sessions.enabled {
            let append = self.sessions.append_turn(
                session_id,
                question,
                &answer.answer,
                Duration::from_secs(rag.sessions.ttl_seconds),
            );
            if let Err(e) = bounded(deadline, append).await? {
                warn!(error = %e, "Session append failed, history not extended");
            }
        }

        Ok(())
    }

    fn terminal(
        &self,
        rag: &RagConfig,
        answer: CachedAnswer,
        started: Instant,
        cache_hit: bool,
        session_id: String,
        model_used: Option<String>,
    ) -> QueryResponse {
        QueryResponse {
            rag_id: rag.rag_id.clone(),
            answer: answer.answer,
            context_chunks: answer.context_chunks,
            latency_ms: started.elapsed().as_millis() as u64,
            cache_hit,
            session_id,
            model_used,
        }
    }
}
