//! OpenRouter chat-completions provider.
//!
//! Speaks the OpenAI-compatible wire format. Each call gets its own timeout;
//! retryable failures (network, timeout, 429, 5xx) back off exponentially
//! from a configurable base, honoring Retry-After on 429.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ChatProvider, Completion, CompletionRequest, LlmError};

/// Construction parameters of one [`OpenRouterProvider`].
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// Endpoint base URL; `/v1/chat/completions` is appended.
    pub base_url: String,
    /// Bearer credential.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First backoff delay; doubles per retry.
    pub retry_base_delay: Duration,
}

impl OpenRouterConfig {
    /// Config with the standard 1 s backoff base.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
            max_retries,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [super::ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
}

/// One model behind the OpenAI-compatible chat-completions API.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    config: OpenRouterConfig,
    url: String,
}

impl OpenRouterProvider {
    /// Creates a provider. Fails only if the HTTP client cannot be built.
    pub fn new(config: OpenRouterConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                model: config.model.clone(),
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let base = config.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        let url = format!("{base}/v1/chat/completions");

        Ok(Self {
            client,
            config,
            url,
        })
    }

    async fn attempt(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let model = &self.config.model;
        let body = WireRequest {
            model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(model = %model, url = %self.url, "Sending chat completion request");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        model: model.clone(),
                    }
                } else {
                    LlmError::RequestFailed {
                        model: model.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);

        let text = response.text().await.map_err(|e| LlmError::RequestFailed {
            model: model.clone(),
            message: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            let message: String = text.chars().take(200).collect();
            return Err(match status.as_u16() {
                429 => LlmError::RateLimited {
                    model: model.clone(),
                    retry_after,
                },
                s if s >= 500 => LlmError::Upstream {
                    model: model.clone(),
                    status: s,
                    message,
                },
                s => LlmError::Rejected {
                    model: model.clone(),
                    status: s,
                    message,
                },
            });
        }

        let parsed: WireResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::InvalidResponse {
                model: model.clone(),
                message: format!("JSON parse error: {e}"),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse {
                model: model.clone(),
                message: "no choices in response".to_string(),
            })?;

        Ok(Completion {
            content,
            model: model.clone(),
        })
    }
}

#[async_trait]
impl ChatProvider for OpenRouterProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let mut delay = self.config.retry_base_delay;

        for attempt in 0..=self.config.max_retries {
            match self.attempt(request).await {
                Ok(completion) => return Ok(completion),
                Err(e) => {
                    if attempt == self.config.max_retries || !e.is_retryable() {
                        return Err(e);
                    }

                    if let LlmError::RateLimited {
                        retry_after: Some(wait),
                        ..
                    } = &e
                    {
                        delay = (*wait).max(delay);
                    }

                    warn!(
                        model = %self.config.model,
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Chat completion attempt failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }

        // The loop returns on the last attempt; this satisfies the compiler.
        Err(LlmError::RequestFailed {
            model: self.config.model.clone(),
            message: "retry budget exhausted".to_string(),
        })
    }
}
