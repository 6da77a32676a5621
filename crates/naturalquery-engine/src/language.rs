//! Translation of questions and answers to and from English

use crate::prompts;
use crate::translator::with_timeout;
use naturalquery_core::{Conversation, Language};
use naturalquery_llm::{PromptClient, PromptFailure};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Stateless translator backed by a prompt client
///
/// Each call is an independent round-trip. English input or output is passed
/// through without calling the model.
#[derive(Clone)]
pub struct LanguageTranslator {
    llm: Arc<dyn PromptClient>,
    call_timeout: Option<Duration>,
}

impl LanguageTranslator {
    pub fn new(llm: Arc<dyn PromptClient>) -> Self {
        Self {
            llm,
            call_timeout: None,
        }
    }

    /// Bound every translation call
    pub fn with_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Translate `text` written in `source` to English
    pub async fn to_english(&self, text: &str, source: Language) -> Result<String, PromptFailure> {
        if source.is_english() {
            return Ok(text.to_string());
        }
        debug!(from = source.code(), "translating to English");
        self.ask(prompts::to_english(text, source)).await
    }

    /// Translate English `text` to `target`
    pub async fn from_english(&self, text: &str, target: Language) -> Result<String, PromptFailure> {
        if target.is_english() {
            return Ok(text.to_string());
        }
        debug!(to = target.code(), "translating from English");
        self.ask(prompts::from_english(text, target)).await
    }

    async fn ask(&self, conversation: Conversation) -> Result<String, PromptFailure> {
        with_timeout(self.call_timeout, self.llm.ask(&conversation))
            .await
            .unwrap_or_else(|limit| Err(PromptFailure::Timeout(limit)))
    }
}
