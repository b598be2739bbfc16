//! Scriptable [`ChatProvider`] for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{ChatProvider, Completion, CompletionRequest, LlmError};

enum Behavior {
    Succeed(String),
    SucceedAfterDelay(String, std::time::Duration),
    FailUpstream,
    FailRejected(u16),
    /// Fail with 429 for the first `n` calls, then succeed.
    RateLimitedThenSucceed(u64, String),
}

/// Mock provider with a fixed behavior and call accounting.
pub struct MockChatProvider {
    model: String,
    behavior: Behavior,
    calls: AtomicU64,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl MockChatProvider {
    fn new(model: &str, behavior: Behavior) -> Self {
        Self {
            model: model.to_string(),
            behavior,
            calls: AtomicU64::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Always answers `content`.
    pub fn succeeding(model: &str, content: &str) -> Self {
        Self::new(model, Behavior::Succeed(content.to_string()))
    }

    /// Answers `content` after sleeping `delay` (timeout tests).
    pub fn succeeding_after_delay(model: &str, content: &str, delay: std::time::Duration) -> Self {
        Self::new(
            model,
            Behavior::SucceedAfterDelay(content.to_string(), delay),
        )
    }

    /// Always fails with a retryable upstream error.
    pub fn failing_upstream(model: &str) -> Self {
        Self::new(model, Behavior::FailUpstream)
    }

    /// Always fails with a permanent rejection (`status`).
    pub fn failing_rejected(model: &str, status: u16) -> Self {
        Self::new(model, Behavior::FailRejected(status))
    }

    /// Fails with 429 for the first `n` calls, then answers `content`.
    pub fn rate_limited_then_succeeding(model: &str, n: u64, content: &str) -> Self {
        Self::new(
            model,
            Behavior::RateLimitedThenSucceed(n, content.to_string()),
        )
    }

    /// Number of `complete` calls observed.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        match &self.behavior {
            Behavior::Succeed(content) => Ok(Completion {
                content: content.clone(),
                model: self.model.clone(),
            }),
            Behavior::SucceedAfterDelay(content, delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Completion {
                    content: content.clone(),
                    model: self.model.clone(),
                })
            }
            Behavior::FailUpstream => Err(LlmError::Upstream {
                model: self.model.clone(),
                status: 503,
                message: "mock upstream failure".to_string(),
            }),
            Behavior::FailRejected(status) => Err(LlmError::Rejected {
                model: self.model.clone(),
                status: *status,
                message: "mock rejection".to_string(),
            }),
            Behavior::RateLimitedThenSucceed(n, content) => {
                if call < *n {
                    Err(LlmError::RateLimited {
                        model: self.model.clone(),
                        retry_after: None,
                    })
                } else {
                    Ok(Completion {
                        content: content.clone(),
                        model: self.model.clone(),
                    })
                }
            }
        }
    }
}
