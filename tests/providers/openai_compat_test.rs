//! Wire format tests for the OpenAI-compatible adapter family.

use serde_json::json;

use conclave::providers::openai_compat::{build_request, parse_response, OpenAiCompatProvider};
use conclave::providers::{Message, Provider, ProviderTag, QueryError, Role};

fn messages() -> Vec<Message> {
    vec![
        Message::system("You are helpful."),
        Message::user("Hello"),
    ]
}

#[test]
fn build_request_maps_roles_and_temperature() {
    let req = build_request("gpt-4o", &messages(), 0.7);
    assert_eq!(req.model, "gpt-4o");
    assert!((req.temperature - 0.7).abs() < f64::EPSILON);
    assert_eq!(req.messages.len(), 2);
    assert_eq!(req.messages[0].role, "system");
    assert_eq!(req.messages[0].content, "You are helpful.");
    assert_eq!(req.messages[1].role, "user");
    assert_eq!(req.messages[1].content, "Hello");
}

#[test]
fn build_request_serializes_expected_body_shape() {
    let req = build_request("gpt-4o", &[Message::user("hi")], 0.3);
    let value = serde_json::to_value(&req).expect("request should serialize");
    assert_eq!(value["model"], "gpt-4o");
    assert_eq!(value["messages"][0]["role"], "user");
    assert_eq!(value["messages"][0]["content"], "hi");
    assert_eq!(value["temperature"], 0.3);
}

#[test]
fn parse_response_reads_first_choice_content() {
    let body = json!({
        "choices": [
            {"message": {"role": "assistant", "content": "first"}},
            {"message": {"role": "assistant", "content": "second"}}
        ]
    })
    .to_string();
    let content = parse_response(ProviderTag::Openai, &body).expect("should parse");
    assert_eq!(content, "first");
}

#[test]
fn parse_response_missing_choices_is_parse_error() {
    let body = json!({"choices": []}).to_string();
    let err = parse_response(ProviderTag::Openrouter, &body).expect_err("should fail");
    assert!(matches!(err, QueryError::Parse { .. }));
    assert!(err.to_string().contains("choices[0]"));
}

#[test]
fn parse_response_null_content_is_empty_string() {
    let body = json!({
        "choices": [{"message": {"role": "assistant", "content": null}}]
    })
    .to_string();
    let content = parse_response(ProviderTag::Openai, &body).expect("should parse");
    assert_eq!(content, "");
}

#[test]
fn parse_response_rejects_invalid_json() {
    let err = parse_response(ProviderTag::Mistral, "not json").expect_err("should fail");
    assert!(matches!(err, QueryError::Parse { .. }));
}

#[test]
fn family_constructors_carry_their_tags() {
    let client = reqwest::Client::new();
    assert_eq!(
        OpenAiCompatProvider::openai(client.clone(), None).tag(),
        ProviderTag::Openai
    );
    assert_eq!(
        OpenAiCompatProvider::mistral(client.clone(), None).tag(),
        ProviderTag::Mistral
    );
    assert_eq!(
        OpenAiCompatProvider::deepseek(client.clone(), None).tag(),
        ProviderTag::Deepseek
    );
    assert_eq!(
        OpenAiCompatProvider::openrouter(client, None).tag(),
        ProviderTag::Openrouter
    );
}

#[tokio::test]
async fn query_without_key_is_missing_key_error() {
    let provider = OpenAiCompatProvider::openai(reqwest::Client::new(), None);
    let err = provider
        .query("gpt-4o", &messages(), &Default::default())
        .await
        .expect_err("should fail before any request");
    assert!(matches!(
        err,
        QueryError::MissingKey {
            provider: ProviderTag::Openai
        }
    ));
}

#[tokio::test]
async fn blank_key_counts_as_missing() {
    let provider =
        OpenAiCompatProvider::openrouter(reqwest::Client::new(), Some("   ".to_owned()));
    let err = provider
        .query("some/model", &messages(), &Default::default())
        .await
        .expect_err("should fail before any request");
    assert!(matches!(err, QueryError::MissingKey { .. }));
}

#[test]
fn role_enum_serializes_lowercase() {
    let value = serde_json::to_value(Role::Assistant).expect("role should serialize");
    assert_eq!(value, json!("assistant"));
}
