//! Chat-completion invocation.
//!
//! [`ChatProvider`] is the seam; [`OpenRouterProvider`] the production
//! implementation (one model, retry with backoff), and
//! [`FailoverInvoker`] the primary/fallback pair the pipeline calls.

pub mod error;
pub mod failover;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod openrouter;

pub use error::LlmError;
pub use failover::FailoverInvoker;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockChatProvider;
pub use openrouter::{OpenRouterConfig, OpenRouterProvider};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions to the model.
    System,
    /// End-user input.
    User,
    /// Prior model output.
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: Role,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Builds a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Builds a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Builds an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Parameters of one completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Ordered message list; the latest user turn is last.
    pub messages: Vec<ChatMessage>,
    /// Completion token budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// A generated answer and the model that produced it.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated content of the first choice.
    pub content: String,
    /// Model that actually answered (primary or fallback).
    pub model: String,
}

/// A single chat-completion backend bound to one model.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// The model this provider calls.
    fn model(&self) -> &str;

    /// Runs one completion, applying the provider's own retry policy.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;
}
