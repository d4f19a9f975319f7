//! Wire format tests for the Anthropic adapter.

use serde_json::json;

use conclave::providers::anthropic::{build_request, parse_response, AnthropicProvider};
use conclave::providers::{Message, Provider, ProviderTag, QueryError};

#[test]
fn build_request_lifts_system_messages() {
    let messages = vec![
        Message::system("Be terse."),
        Message::user("Hello"),
        Message::system("Answer in English."),
    ];
    let req = build_request("claude-sonnet-4", &messages, 0.3);

    assert_eq!(req.model, "claude-sonnet-4");
    assert_eq!(req.system.as_deref(), Some("Be terse.\nAnswer in English."));
    assert_eq!(req.messages.len(), 1);
    assert_eq!(req.messages[0].role, "user");
    assert_eq!(req.messages[0].content, "Hello");
}

#[test]
fn build_request_without_system_omits_field() {
    let req = build_request("claude-sonnet-4", &[Message::user("hi")], 0.7);
    assert!(req.system.is_none());

    let value = serde_json::to_value(&req).expect("request should serialize");
    assert!(value.get("system").is_none());
    assert_eq!(value["max_tokens"], 4096);
}

#[test]
fn parse_response_concatenates_text_blocks() {
    let body = json!({
        "content": [
            {"type": "text", "text": "Hello "},
            {"type": "tool_use", "id": "t1", "name": "noop", "input": {}},
            {"type": "text", "text": "world"}
        ]
    })
    .to_string();
    let content = parse_response(&body).expect("should parse");
    assert_eq!(content, "Hello world");
}

#[test]
fn parse_response_empty_content_is_empty_string() {
    let body = json!({"content": []}).to_string();
    assert_eq!(parse_response(&body).expect("should parse"), "");
}

#[test]
fn parse_response_rejects_invalid_json() {
    let err = parse_response("<html>").expect_err("should fail");
    assert!(matches!(
        err,
        QueryError::Parse {
            provider: ProviderTag::Anthropic,
            ..
        }
    ));
}

#[tokio::test]
async fn query_without_key_is_missing_key_error() {
    let provider = AnthropicProvider::new(reqwest::Client::new(), None);
    let err = provider
        .query("claude-sonnet-4", &[Message::user("hi")], &Default::default())
        .await
        .expect_err("should fail before any request");
    assert!(matches!(
        err,
        QueryError::MissingKey {
            provider: ProviderTag::Anthropic
        }
    ));
}
