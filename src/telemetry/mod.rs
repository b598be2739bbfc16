//! In-process counters and latency window.
//!
//! All state is process-scoped and lost on restart by design. Counters are
//! monotonic within a process lifetime; the latency window keeps the most
//! recent [`crate::constants::LATENCY_WINDOW`] samples.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::constants::LATENCY_WINDOW;

/// Thread-safe telemetry surface shared by the whole pipeline.
///
/// Counter mutations are atomic per field; [`snapshot`](Telemetry::snapshot)
/// is internally consistent per field but makes no cross-field atomicity
/// claim (a request may be counted before its latency lands).
#[derive(Debug, Default)]
pub struct Telemetry {
    requests_total: AtomicU64,
    errors_total: AtomicU64,
    cache_hits_total: AtomicU64,
    rate_limited_total: AtomicU64,
    latencies_ms: Mutex<VecDeque<f64>>,
}

/// Point-in-time view of the telemetry state.
///
/// Serializes to exactly the keys exposed by `GET /metrics`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    /// Requests that entered the pipeline.
    pub requests_total: u64,
    /// Requests that ended in a non-success terminal answer
    /// (rate-limit rejections excluded).
    pub errors_total: u64,
    /// Responses served from the response cache.
    pub cache_hits_total: u64,
    /// Requests rejected by the admission controller.
    pub rate_limited_total: u64,
    /// Mean of the retained latency samples, in milliseconds.
    pub avg_latency_ms: f64,
    /// p95 of the retained latency samples, in milliseconds.
    pub p95_latency_ms: f64,
    /// Number of retained latency samples.
    pub latency_samples: usize,
}

impl Telemetry {
    /// Creates an empty telemetry surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a request entering the pipeline.
    #[inline]
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a non-success terminal answer.
    #[inline]
    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a response served from cache.
    #[inline]
    pub fn record_cache_hit(&self) {
        self.cache_hits_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts an admission rejection.
    #[inline]
    pub fn record_rate_limited(&self) {
        self.rate_limited_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Appends a latency sample, evicting the oldest beyond the window.
    pub fn record_latency(&self, millis: f64) {
        let mut window = self.latencies_ms.lock();
        if window.len() == LATENCY_WINDOW {
            window.pop_front();
        }
        window.push_back(millis);
    }

    /// Returns the current counters plus computed latency statistics.
    ///
    /// p95 is the value at index `floor(0.95 * n)` of the sorted window.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (avg, p95, samples) = {
            let window = self.latencies_ms.lock();
            if window.is_empty() {
                (0.0, 0.0, 0)
            } else {
                let mut sorted: Vec<f64> = window.iter().copied().collect();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let avg = sorted.iter().sum::<f64>() / sorted.len() as f64;
                let idx = ((0.95 * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
                (avg, sorted[idx], sorted.len())
            }
        };

        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            cache_hits_total: self.cache_hits_total.load(Ordering::Relaxed),
            rate_limited_total: self.rate_limited_total.load(Ordering::Relaxed),
            avg_latency_ms: avg,
            p95_latency_ms: p95,
            latency_samples: samples,
        }
    }
}
