//! Per-RAG token-bucket admission.
//!
//! Bucket state lives in the KV backend under `ratelimit:<rag_id>:<client>`
//! so every service replica behind the proxy shares one budget. The
//! read-modify-write is atomic per key (see
//! [`KvStore::bucket_take`](crate::kv::KvStore::bucket_take)); buckets
//! self-expire after [`crate::constants::BUCKET_IDLE_TTL_SECS`] idle
//! seconds.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::config::rag::LimitSettings;
use crate::hashing::bucket_key;
use crate::kv::KvStore;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// A token was taken; proceed.
    Admitted,
    /// The bucket is empty; reject with 429.
    Rejected,
    /// The KV backend was unreachable; proceed without accounting.
    /// Infrastructure failure must never reject user traffic.
    AdmittedDegraded,
}

impl AdmissionDecision {
    /// Returns `true` unless the request was rejected.
    pub fn is_admitted(&self) -> bool {
        !matches!(self, AdmissionDecision::Rejected)
    }
}

/// Token-bucket admission over the shared KV backend.
#[derive(Clone)]
pub struct AdmissionController {
    kv: Arc<dyn KvStore>,
}

impl AdmissionController {
    /// Creates a controller over `kv`.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Checks the bucket of `(rag_id, client)` against `limits`.
    pub async fn check(
        &self,
        rag_id: &str,
        client: &str,
        limits: &LimitSettings,
    ) -> AdmissionDecision {
        let now_s = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        self.check_at(rag_id, client, limits, now_s).await
    }

    /// Clock-injected variant of [`check`](Self::check).
    pub async fn check_at(
        &self,
        rag_id: &str,
        client: &str,
        limits: &LimitSettings,
        now_s: f64,
    ) -> AdmissionDecision {
        let key = bucket_key(rag_id, client);

        match self
            .kv
            .bucket_take(
                &key,
                now_s,
                limits.rps,
                limits.burst,
                Duration::from_secs(crate::constants::BUCKET_IDLE_TTL_SECS),
            )
            .await
        {
            Ok(true) => AdmissionDecision::Admitted,
            Ok(false) => AdmissionDecision::Rejected,
            Err(e) => {
                warn!(
                    rag_id = %rag_id,
                    error = %e,
                    "Admission store unreachable, admitting without accounting"
                );
                AdmissionDecision::AdmittedDegraded
            }
        }
    }
}
