//! Prompt client capability

use naturalquery_core::Conversation;
use std::time::Duration;

/// Errors from a prompt round-trip
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PromptFailure {
    /// Transport failure before a response was received
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status
    #[error("Provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Missing key, model or URL
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Sends a conversation to a language model and returns its reply
///
/// Implementations must be safe to call concurrently.
#[async_trait::async_trait]
pub trait PromptClient: Send + Sync {
    /// Provider name, for logs
    fn name(&self) -> &str;

    /// One round-trip; the reply is the raw assistant text
    async fn ask(&self, conversation: &Conversation) -> Result<String, PromptFailure>;
}

/// Map a transport error, distinguishing timeouts
pub(crate) fn transport_failure(e: reqwest::Error, timeout: Duration) -> PromptFailure {
    if e.is_timeout() {
        PromptFailure::Timeout(timeout)
    } else {
        PromptFailure::Network(e.to_string())
    }
}
