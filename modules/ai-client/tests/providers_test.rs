//! Wire-level tests for the provider clients against a mock HTTP server.

use std::time::Duration;

use ai_client::{AiError, Claude, CompletionProvider, CompletionRequest, OpenAi, OpenRouter};
use httpmock::prelude::*;
use serde_json::json;

fn request() -> CompletionRequest {
    CompletionRequest::new("You are an analyst.", "Summarize Acme.").temperature(0.0)
}

#[tokio::test]
async fn claude_parses_text_and_usage() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/messages")
                .header("x-api-key", "sk-ant")
                .header("anthropic-version", "2023-06-01");
            then.status(200).json_body(json!({
                "content": [{"type": "text", "text": "{\"summary\": \"ok\"}"}],
                "model": "claude-sonnet-4-20250514",
                "usage": {"input_tokens": 12, "output_tokens": 5}
            }));
        })
        .await;

    let claude = Claude::new("sk-ant", "claude-sonnet-4-20250514")
        .unwrap()
        .with_base_url(server.base_url());
    let completion = claude.complete(&request()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(completion.provider, "anthropic");
    assert_eq!(completion.text, "{\"summary\": \"ok\"}");
    let usage = completion.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 12);
    assert_eq!(usage.completion_tokens, 5);
}

#[tokio::test]
async fn openai_parses_first_choice() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer sk-test");
            then.status(200).json_body(json!({
                "model": "gpt-4o",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "hello"}}],
                "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
            }));
        })
        .await;

    let openai = OpenAi::new("sk-test", "gpt-4o")
        .unwrap()
        .with_base_url(server.base_url());
    let completion = openai.complete(&request()).await.unwrap();

    assert_eq!(completion.text, "hello");
    assert_eq!(completion.model, "gpt-4o");
}

#[tokio::test]
async fn rate_limit_is_classified_with_retry_after() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(429)
                .header("retry-after", "7")
                .body("slow down");
        })
        .await;

    let openai = OpenAi::new("sk-test", "gpt-4o")
        .unwrap()
        .with_base_url(server.base_url());
    let err = openai.complete(&request()).await.unwrap_err();

    match err {
        AiError::RateLimited { retry_after } => {
            assert_eq!(retry_after, Some(Duration::from_secs(7)));
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_is_api_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/messages");
            then.status(500).body("overloaded");
        })
        .await;

    let claude = Claude::new("sk-ant", "claude-sonnet-4-20250514")
        .unwrap()
        .with_base_url(server.base_url());
    let err = claude.complete(&request()).await.unwrap_err();

    assert!(matches!(err, AiError::Api { status: 500, ref body } if body == "overloaded"));
    assert_eq!(err.kind(), "api");
}

#[tokio::test]
async fn empty_choices_is_invalid_response() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({"choices": []}));
        })
        .await;

    let router = OpenRouter::new("or-key", "mistralai/mistral-large")
        .unwrap()
        .with_base_url(server.base_url());
    let err = router.complete(&request()).await.unwrap_err();

    assert!(matches!(err, AiError::InvalidResponse(_)));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(json!({"choices": []}));
        })
        .await;

    let openai = OpenAi::new("sk-test", "gpt-4o")
        .unwrap()
        .with_base_url(server.base_url())
        .with_timeout(Duration::from_millis(50))
        .unwrap();
    let err = openai.complete(&request()).await.unwrap_err();

    assert!(matches!(err, AiError::Timeout));
}
