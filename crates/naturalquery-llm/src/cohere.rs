//! Cohere chat client
//!
//! Cohere takes a single `message` plus a `preamble` and a `chat_history`
//! instead of a message list. System turns become the preamble, the final
//! user turn becomes the message, everything in between becomes history.

use crate::client::{transport_failure, PromptClient, PromptFailure};
use crate::openai::error_message;
use naturalquery_core::{Conversation, Role};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Cohere chat endpoint
pub const COHERE_CHAT_URL: &str = "https://api.cohere.ai/v1/chat";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    text: String,
}

/// Client for the Cohere chat API
pub struct CohereClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    params: Map<String, Value>,
    timeout: Duration,
}

impl CohereClient {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PromptFailure> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PromptFailure::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: COHERE_CHAT_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            params: Map::new(),
            timeout,
        })
    }

    /// Override the chat URL
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Extra body parameters merged into every request
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    fn build_body(&self, conversation: &Conversation) -> Result<Value, PromptFailure> {
        let mut turns: Vec<_> = conversation
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .collect();

        let message = match turns.pop() {
            Some(last) if last.role == Role::User => last.content.clone(),
            _ => {
                return Err(PromptFailure::Config(
                    "conversation must end with a user message".to_string(),
                ))
            }
        };

        let chat_history: Vec<Value> = turns
            .iter()
            .map(|m| {
                let role = if m.role == Role::User { "USER" } else { "CHATBOT" };
                json!({"role": role, "message": m.content})
            })
            .collect();

        let mut body = Map::new();
        body.insert("model".to_string(), Value::String(self.model.clone()));
        body.insert("message".to_string(), Value::String(message));

        let preamble = conversation.system_text();
        if !preamble.is_empty() {
            body.insert("preamble".to_string(), Value::String(preamble));
        }
        if !chat_history.is_empty() {
            body.insert("chat_history".to_string(), Value::Array(chat_history));
        }
        for (key, value) in &self.params {
            body.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(body))
    }
}

#[async_trait::async_trait]
impl PromptClient for CohereClient {
    fn name(&self) -> &str {
        "cohere"
    }

    #[instrument(skip_all, fields(provider = "cohere", model = %self.model))]
    async fn ask(&self, conversation: &Conversation) -> Result<String, PromptFailure> {
        let body = self.build_body(conversation)?;
        debug!(message_count = conversation.len(), "Sending Cohere chat request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_failure(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let message = error_message(&body_text);
            error!(status = status.as_u16(), %message, "Cohere chat rejected");
            return Err(PromptFailure::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| PromptFailure::InvalidResponse(e.to_string()))?;
        Ok(parsed.text)
    }
}
