//! OpenAI-compatible chat completions client
//!
//! Covers OpenAI itself, Anyscale endpoints and any custom URL speaking the
//! same protocol. The request body is `{model, messages, ...params}`; extra
//! parameters (temperature, max_tokens) are merged last and win on conflict.
//! The reply is `choices[0].message.content`.

use crate::client::{transport_failure, PromptClient, PromptFailure};
use naturalquery_core::Conversation;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Base URL of the OpenAI API
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Base URL of Anyscale endpoints
pub const ANYSCALE_BASE_URL: &str = "https://api.endpoints.anyscale.com/v1";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for any OpenAI-compatible chat completions endpoint
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    name: &'static str,
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
    params: Map<String, Value>,
    timeout: Duration,
}

impl OpenAiCompatClient {
    /// Create a client posting to a full chat completions URL
    pub fn new(
        name: &'static str,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PromptFailure> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PromptFailure::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            name,
            endpoint: endpoint.into(),
            api_key: None,
            model: None,
            params: Map::new(),
            timeout,
        })
    }

    /// OpenAI with the given model
    pub fn openai(model: impl Into<String>, timeout: Duration) -> Result<Self, PromptFailure> {
        Ok(Self::new("openai", completions_url(OPENAI_BASE_URL), timeout)?.with_model(model))
    }

    /// Anyscale endpoints with the given model
    pub fn anyscale(model: impl Into<String>, timeout: Duration) -> Result<Self, PromptFailure> {
        Ok(Self::new("anyscale", completions_url(ANYSCALE_BASE_URL), timeout)?.with_model(model))
    }

    /// A custom endpoint; `url` is the complete chat completions URL
    pub fn custom(url: impl Into<String>, timeout: Duration) -> Result<Self, PromptFailure> {
        Self::new("custom", url, timeout)
    }

    /// Point at another base URL (e.g. a proxy) keeping the standard path
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.endpoint = completions_url(base_url);
        self
    }

    /// Bearer token sent with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Extra body parameters merged into every request
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Chat completions URL requests are posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_body(&self, conversation: &Conversation) -> Result<Value, PromptFailure> {
        let mut body = Map::new();
        if let Some(model) = &self.model {
            body.insert("model".to_string(), Value::String(model.clone()));
        }
        let messages = serde_json::to_value(conversation)
            .map_err(|e| PromptFailure::InvalidResponse(format!("Failed to encode messages: {}", e)))?;
        body.insert("messages".to_string(), messages);
        for (key, value) in &self.params {
            body.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(body))
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Pull a readable message out of an error body
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait::async_trait]
impl PromptClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        self.name
    }

    #[instrument(skip_all, fields(provider = self.name, model = self.model.as_deref().unwrap_or("")))]
    async fn ask(&self, conversation: &Conversation) -> Result<String, PromptFailure> {
        let body = self.build_body(conversation)?;

        debug!(
            endpoint = %self.endpoint,
            message_count = conversation.len(),
            "Sending chat completion request"
        );

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_failure(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let message = error_message(&body_text);
            error!(status = status.as_u16(), %message, "Chat completion rejected");
            return Err(PromptFailure::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| PromptFailure::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PromptFailure::InvalidResponse("no message content in choices".to_string()))
    }
}
