//! Wire format tests for the Ollama adapter.

use serde_json::json;

use conclave::providers::ollama::{build_request, parse_response, OllamaProvider};
use conclave::providers::{Message, Provider, ProviderTag, QueryError};

#[test]
fn build_request_pins_stream_false_and_sets_options() {
    let req = build_request("llama3:8b", &[Message::user("hi")], 0.3);
    assert_eq!(req.model, "llama3:8b");
    assert!(!req.stream);

    let value = serde_json::to_value(&req).expect("request should serialize");
    assert_eq!(value["stream"], false);
    assert_eq!(value["options"]["temperature"], 0.3);
    assert_eq!(value["messages"][0]["role"], "user");
}

#[test]
fn parse_response_reads_message_content() {
    let body = json!({
        "model": "llama3:8b",
        "message": {"role": "assistant", "content": "local reply"},
        "done": true
    })
    .to_string();
    assert_eq!(parse_response(&body).expect("should parse"), "local reply");
}

#[test]
fn parse_response_rejects_missing_message() {
    let err = parse_response("{}").expect_err("should fail");
    assert!(matches!(
        err,
        QueryError::Parse {
            provider: ProviderTag::Ollama,
            ..
        }
    ));
}

#[test]
fn constructor_trims_trailing_slashes() {
    // Reaches the wire as {base}/api/chat, so trailing slashes must go.
    let provider = OllamaProvider::new(reqwest::Client::new(), "http://localhost:11434///");
    assert_eq!(provider.tag(), ProviderTag::Ollama);
}

#[tokio::test]
async fn validate_key_needs_no_key() {
    // An unreachable server reports failure, but never a missing-key error.
    let provider = OllamaProvider::new(reqwest::Client::new(), "http://127.0.0.1:1");
    let validation = provider.validate_key("").await;
    assert!(!validation.success);
    assert!(!validation.message.contains("key not configured"));
}
