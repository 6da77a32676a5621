//! Build a prompt client from configuration

use crate::client::{PromptClient, PromptFailure};
use crate::cohere::CohereClient;
use crate::openai::OpenAiCompatClient;
use naturalquery_core::{LlmConfig, LlmProvider};
use std::sync::Arc;
use tracing::debug;

/// Create the client selected by `[llm]`
///
/// For `openai` and `anyscale` the optional `url` replaces the base URL; for
/// `custom` it is the complete chat completions URL; for `cohere` it replaces
/// the chat URL.
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn PromptClient>, PromptFailure> {
    let timeout = config.timeout();
    let api_key = config.resolve_api_key();

    let require_key = || {
        api_key.clone().ok_or_else(|| {
            PromptFailure::Config(format!(
                "missing API key: set `api_key` or the {} environment variable",
                config.api_key_env_name()
            ))
        })
    };
    let require_model = || {
        config.model.clone().ok_or_else(|| {
            PromptFailure::Config(format!("provider {:?} requires `model`", config.provider))
        })
    };

    let client: Arc<dyn PromptClient> = match config.provider {
        LlmProvider::OpenAi | LlmProvider::Anyscale => {
            let model = require_model()?;
            let key = require_key()?;
            let mut client = if config.provider == LlmProvider::OpenAi {
                OpenAiCompatClient::openai(model, timeout)?
            } else {
                OpenAiCompatClient::anyscale(model, timeout)?
            };
            if let Some(url) = &config.url {
                client = client.with_base_url(url);
            }
            Arc::new(
                client
                    .with_api_key(key)
                    .with_params(config.model_kwargs.clone()),
            )
        }
        LlmProvider::Custom => {
            let url = config.url.clone().ok_or_else(|| {
                PromptFailure::Config("provider \"custom\" requires `url`".to_string())
            })?;
            let mut client =
                OpenAiCompatClient::custom(url, timeout)?.with_params(config.model_kwargs.clone());
            if let Some(model) = &config.model {
                client = client.with_model(model.clone());
            }
            if let Some(key) = api_key.clone() {
                client = client.with_api_key(key);
            }
            Arc::new(client)
        }
        LlmProvider::Cohere => {
            let mut client = CohereClient::new(require_model()?, require_key()?, timeout)?
                .with_params(config.model_kwargs.clone());
            if let Some(url) = &config.url {
                client = client.with_endpoint(url.clone());
            }
            Arc::new(client)
        }
    };

    debug!(provider = client.name(), "prompt client ready");
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: LlmProvider) -> LlmConfig {
        LlmConfig {
            provider,
            api_key: Some("test-key".to_string()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn builds_each_provider() {
        let openai = LlmConfig {
            model: Some("gpt-4".into()),
            ..config(LlmProvider::OpenAi)
        };
        assert_eq!(client_from_config(&openai).unwrap().name(), "openai");

        let anyscale = LlmConfig {
            model: Some("mistralai/Mixtral-8x7B-Instruct-v0.1".into()),
            ..config(LlmProvider::Anyscale)
        };
        assert_eq!(client_from_config(&anyscale).unwrap().name(), "anyscale");

        let custom = LlmConfig {
            url: Some("http://localhost:8000/v1/chat/completions".into()),
            api_key: None,
            api_key_env: Some("NATURALQUERY_TEST_UNSET_KEY".into()),
            ..config(LlmProvider::Custom)
        };
        assert_eq!(client_from_config(&custom).unwrap().name(), "custom");

        let cohere = LlmConfig {
            model: Some("command-r".into()),
            ..config(LlmProvider::Cohere)
        };
        assert_eq!(client_from_config(&cohere).unwrap().name(), "cohere");
    }

    #[test]
    fn missing_model_is_a_config_error() {
        assert!(matches!(
            client_from_config(&config(LlmProvider::OpenAi)),
            Err(PromptFailure::Config(_))
        ));
    }

    #[test]
    fn missing_key_names_the_variable() {
        let cfg = LlmConfig {
            model: Some("gpt-4".into()),
            api_key: None,
            api_key_env: Some("NATURALQUERY_TEST_UNSET_KEY".into()),
            ..config(LlmProvider::OpenAi)
        };

        match client_from_config(&cfg) {
            Err(PromptFailure::Config(message)) => {
                assert!(message.contains("NATURALQUERY_TEST_UNSET_KEY"))
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a missing key error"),
        }
    }

    #[test]
    fn custom_requires_url() {
        assert!(matches!(
            client_from_config(&config(LlmProvider::Custom)),
            Err(PromptFailure::Config(_))
        ));
    }
}
