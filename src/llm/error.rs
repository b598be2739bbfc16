use std::time::Duration;

use thiserror::Error;

/// Errors returned by chat-completion providers.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request could not be sent or the connection broke.
    #[error("request to model '{model}' failed: {message}")]
    RequestFailed {
        /// Model the request addressed.
        model: String,
        /// Error message.
        message: String,
    },

    /// One attempt exceeded its per-call timeout.
    #[error("request to model '{model}' timed out")]
    Timeout {
        /// Model the request addressed.
        model: String,
    },

    /// The endpoint answered 429.
    #[error("model '{model}' rate limited")]
    RateLimited {
        /// Model the request addressed.
        model: String,
        /// Server-suggested wait, when the Retry-After header was present.
        retry_after: Option<Duration>,
    },

    /// The endpoint answered a non-retryable status (4xx other than 429).
    #[error("model '{model}' rejected the request with HTTP {status}: {message}")]
    Rejected {
        /// Model the request addressed.
        model: String,
        /// Status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },

    /// The endpoint answered 5xx.
    #[error("model '{model}' upstream error HTTP {status}: {message}")]
    Upstream {
        /// Model the request addressed.
        model: String,
        /// Status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("invalid response from model '{model}': {message}")]
    InvalidResponse {
        /// Model the request addressed.
        model: String,
        /// Error message.
        message: String,
    },

    /// Primary and fallback both exhausted their retry budgets.
    #[error("all models unavailable: primary '{primary}' and fallback '{fallback}' failed")]
    AllModelsFailed {
        /// Primary model identifier.
        primary: String,
        /// Fallback model identifier.
        fallback: String,
    },
}

impl LlmError {
    /// Returns `true` when another attempt against the same model could
    /// succeed: network failures, timeouts, 429, and 5xx. Other 4xx are
    /// permanent for this request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RequestFailed { .. }
                | LlmError::Timeout { .. }
                | LlmError::RateLimited { .. }
                | LlmError::Upstream { .. }
        )
    }
}
