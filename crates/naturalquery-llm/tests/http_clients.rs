//! HTTP-level tests for the prompt clients against a local mock server

use naturalquery_core::{Conversation, LlmConfig, LlmProvider};
use naturalquery_llm::{client_from_config, CohereClient, OpenAiCompatClient, PromptClient, PromptFailure};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// OpenAI-compatible
// =============================================================================

#[tokio::test]
async fn test_openai_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4",
            "temperature": 0.0,
            "messages": [
                {"role": "system", "content": "You are terse."},
                {"role": "user", "content": "How many users?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "```sql\nSELECT COUNT(*) FROM users;\n```"}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = serde_json::Map::new();
    params.insert("temperature".into(), json!(0.0));

    let client = OpenAiCompatClient::openai("gpt-4", Duration::from_secs(5))
        .unwrap()
        .with_base_url(&format!("{}/v1", server.uri()))
        .with_api_key("sk-test")
        .with_params(params);

    let reply = client
        .ask(&Conversation::with_system("You are terse.", "How many users?"))
        .await
        .unwrap();

    assert_eq!(reply, "```sql\nSELECT COUNT(*) FROM users;\n```");
}

#[tokio::test]
async fn test_rejected_status_carries_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let client = OpenAiCompatClient::custom(
        format!("{}/chat/completions", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap();

    let err = client.ask(&Conversation::new().user("hi")).await.unwrap_err();
    assert_eq!(
        err,
        PromptFailure::Rejected {
            status: 401,
            message: "Incorrect API key provided".to_string()
        }
    );
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = OpenAiCompatClient::custom(server.uri(), Duration::from_secs(5)).unwrap();
    assert!(matches!(
        client.ask(&Conversation::new().user("hi")).await,
        Err(PromptFailure::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({"choices": [{"message": {"content": "late"}}]})),
        )
        .mount(&server)
        .await;

    let timeout = Duration::from_millis(200);
    let client = OpenAiCompatClient::custom(server.uri(), timeout).unwrap();

    assert_eq!(
        client.ask(&Conversation::new().user("hi")).await,
        Err(PromptFailure::Timeout(timeout))
    );
}

#[tokio::test]
async fn test_unreachable_provider_is_network_error() {
    // nothing listens on the discard port
    let client =
        OpenAiCompatClient::custom("http://127.0.0.1:9/chat/completions", Duration::from_secs(2))
            .unwrap();

    assert!(matches!(
        client.ask(&Conversation::new().user("hi")).await,
        Err(PromptFailure::Network(_))
    ));
}

// =============================================================================
// Cohere
// =============================================================================

#[tokio::test]
async fn test_cohere_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .and(header("authorization", "Bearer co-test"))
        .and(body_partial_json(json!({
            "model": "command-r",
            "message": "Translate: bonjour",
            "preamble": "You are a translator."
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response_id": "r1",
            "text": "hello"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = CohereClient::new("command-r", "co-test", Duration::from_secs(5))
        .unwrap()
        .with_endpoint(format!("{}/v1/chat", server.uri()));

    let reply = client
        .ask(&Conversation::with_system("You are a translator.", "Translate: bonjour"))
        .await
        .unwrap();
    assert_eq!(reply, "hello");
}

// =============================================================================
// Factory
// =============================================================================

#[tokio::test]
async fn test_factory_custom_provider_hits_configured_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/llm"))
        .and(body_partial_json(json!({"max_tokens": 64})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "ok"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut model_kwargs = serde_json::Map::new();
    model_kwargs.insert("max_tokens".into(), json!(64));

    let config = LlmConfig {
        provider: LlmProvider::Custom,
        url: Some(format!("{}/llm", server.uri())),
        api_key: Some("token".into()),
        model_kwargs,
        ..LlmConfig::default()
    };

    let client = client_from_config(&config).unwrap();
    assert_eq!(client.ask(&Conversation::new().user("ping")).await.unwrap(), "ok");
}
