//! Prompt assembly.
//!
//! Two templates per RAG, `system` and `user`, loaded from their configured
//! paths on first use and cached in-process. The user template supports the
//! `{question}` and `{context}` tokens; nothing else is substituted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use moka::sync::Cache;
use thiserror::Error;

use crate::config::rag::RagConfig;
use crate::constants::{CONTEXT_SEPARATOR, NO_CONTEXT_PLACEHOLDER};
use crate::llm::ChatMessage;
use crate::retrieval::ContextChunk;
use crate::session::Turn;

/// Errors surfaced by prompt assembly.
#[derive(Debug, Error)]
pub enum PromptError {
    /// A template file could not be read.
    #[error("failed to read template '{path}': {message}")]
    TemplateRead {
        /// Template path.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },
}

/// Formats retrieved chunks into the `{context}` block.
///
/// Each chunk renders as `[Source N: <source> (relevance: <score>)]` over
/// its text, blocks joined by a separator line. No chunks renders the
/// no-context placeholder.
pub fn format_context(chunks: &[ContextChunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT_PLACEHOLDER.to_string();
    }

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[Source {}: {} (relevance: {:.2})]\n{}",
                i + 1,
                chunk.source,
                chunk.score,
                chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Template loading and message-list construction.
///
/// The template cache is keyed by path; a reingest that changes template
/// content under the same path needs a process restart (or registry reload
/// pointing at new paths) to take effect.
pub struct PromptAssembler {
    templates: Cache<PathBuf, Arc<str>>,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptAssembler {
    const TEMPLATE_CACHE_CAPACITY: u64 = 256;

    /// Creates an assembler with an empty template cache.
    pub fn new() -> Self {
        Self {
            templates: Cache::builder()
                .max_capacity(Self::TEMPLATE_CACHE_CAPACITY)
                .build(),
        }
    }

    /// Builds the ordered message list for one completion call.
    ///
    /// Layout: system template, then the session turns oldest first (each a
    /// user/assistant pair), then the substituted user template. The most
    /// recent user turn is always last.
    pub fn build_messages(
        &self,
        rag: &RagConfig,
        question: &str,
        chunks: &[ContextChunk],
        history: &[Turn],
    ) -> Result<Vec<ChatMessage>, PromptError> {
        let system = self.load_template(&rag.prompts.system_template)?;
        let user = self.load_template(&rag.prompts.user_template)?;

        let mut messages = Vec::with_capacity(2 + history.len() * 2);
        messages.push(ChatMessage::system(system.as_ref()));

        for turn in history {
            messages.push(ChatMessage::user(&turn.question));
            messages.push(ChatMessage::assistant(&turn.answer));
        }

        let substituted = user
            .replace("{context}", &format_context(chunks))
            .replace("{question}", question);
        messages.push(ChatMessage::user(substituted));

        Ok(messages)
    }

    fn load_template(&self, path: &Path) -> Result<Arc<str>, PromptError> {
        self.templates
            .try_get_with(path.to_path_buf(), || {
                std::fs::read_to_string(path).map(Arc::from)
            })
            .map_err(|e: Arc<std::io::Error>| PromptError::TemplateRead {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }
}
