//! Primary/fallback model orchestration.
//!
//! Each provider applies its own retry policy; the invoker's job is only the
//! handoff. Any primary failure, retryable or not, hands the same request to
//! the fallback: a permanent rejection of the primary model (e.g. an invalid
//! model id answered with HTTP 400) is exactly the case the fallback exists
//! for. The returned [`Completion`] names the model that answered.

use std::sync::Arc;

use tracing::warn;

use super::{ChatProvider, Completion, CompletionRequest, LlmError};

/// Calls the primary model, then the fallback with the same parameters.
pub struct FailoverInvoker {
    primary: Arc<dyn ChatProvider>,
    fallback: Arc<dyn ChatProvider>,
}

impl FailoverInvoker {
    /// Creates an invoker over a primary/fallback pair.
    pub fn new(primary: Arc<dyn ChatProvider>, fallback: Arc<dyn ChatProvider>) -> Self {
        Self { primary, fallback }
    }

    /// The primary model identifier.
    pub fn primary_model(&self) -> &str {
        self.primary.model()
    }

    /// The fallback model identifier.
    pub fn fallback_model(&self) -> &str {
        self.fallback.model()
    }

    /// Runs the completion, failing over once.
    ///
    /// Returns [`LlmError::AllModelsFailed`] when both models exhausted
    /// their budgets.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let primary_err = match self.primary.complete(request).await {
            Ok(completion) => return Ok(completion),
            Err(e) => e,
        };

        warn!(
            primary = %self.primary.model(),
            fallback = %self.fallback.model(),
            error = %primary_err,
            "Primary model failed, invoking fallback"
        );

        match self.fallback.complete(request).await {
            Ok(completion) => Ok(completion),
            Err(fallback_err) => {
                warn!(
                    fallback = %self.fallback.model(),
                    error = %fallback_err,
                    "Fallback model failed"
                );
                Err(LlmError::AllModelsFailed {
                    primary: self.primary.model().to_string(),
                    fallback: self.fallback.model().to_string(),
                })
            }
        }
    }
}
