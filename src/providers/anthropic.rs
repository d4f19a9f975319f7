//! Anthropic adapter using the `/v1/messages` API.
//!
//! Differs from the chat-completions family in three ways: the key travels
//! in `x-api-key`, system messages are lifted into a top-level `system`
//! field, and `max_tokens` is mandatory.

use serde::{Deserialize, Serialize};

use super::{
    check_http_response, strip_tag_prefix, KeyValidation, Message, ModelInfo, Provider,
    ProviderTag, QueryError, QueryOptions, Role,
};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

const PROBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Messages API request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    /// Model identifier with the provider prefix stripped.
    pub model: String,
    /// Non-system conversation messages.
    pub messages: Vec<AnthropicMessage>,
    /// Concatenated system messages, when any were supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Maximum completion tokens (mandatory on this API).
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

/// A message in messages-API format.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct AnthropicMessage {
    /// Role (`user` or `assistant`).
    pub role: String,
    /// Plain text content.
    pub content: String,
}

/// Messages API response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    /// Content blocks; all `text` blocks are concatenated.
    #[serde(default)]
    pub content: Vec<AnthropicContentBlock>,
}

/// A single content block.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AnthropicContentBlock {
    /// Block type (`text` blocks carry the reply).
    #[serde(rename = "type")]
    pub kind: String,
    /// Text payload for `text` blocks.
    #[serde(default)]
    pub text: String,
}

/// Model listing response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AnthropicModelList {
    /// Advertised models.
    #[serde(default)]
    pub data: Vec<AnthropicModelEntry>,
}

/// A single advertised model.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AnthropicModelEntry {
    /// Raw model identifier.
    pub id: String,
    /// Display name, when provided.
    #[serde(default)]
    pub display_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Request / response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build a messages-API request, lifting system messages into `system`.
#[doc(hidden)]
pub fn build_request(model: &str, messages: &[Message], temperature: f64) -> AnthropicRequest {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut wire_messages: Vec<AnthropicMessage> = Vec::new();

    for message in messages {
        match message.role {
            Role::System => system_parts.push(&message.content),
            Role::User | Role::Assistant => wire_messages.push(AnthropicMessage {
                role: message.role.as_str().to_owned(),
                content: message.content.clone(),
            }),
        }
    }

    AnthropicRequest {
        model: model.to_owned(),
        messages: wire_messages,
        system: if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n"))
        },
        max_tokens: DEFAULT_MAX_TOKENS,
        temperature,
    }
}

/// Parse a messages-API response into the concatenated reply text.
///
/// # Errors
///
/// Returns [`QueryError::Parse`] when the body does not deserialize.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<String, QueryError> {
    let resp: AnthropicResponse = serde_json::from_str(body).map_err(|e| QueryError::Parse {
        provider: ProviderTag::Anthropic,
        detail: e.to_string(),
    })?;

    let mut text = String::new();
    for block in resp.content {
        if block.kind == "text" {
            text.push_str(&block.text);
        }
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Anthropic messages API adapter.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create an Anthropic adapter sharing the process HTTP client.
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { api_key, client }
    }

    fn key(&self) -> Result<&str, QueryError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(QueryError::MissingKey {
                provider: ProviderTag::Anthropic,
            })
    }

    async fn probe_models(&self, api_key: &str) -> Result<AnthropicModelList, QueryError> {
        let response = self
            .client
            .get(format!("{ANTHROPIC_API_BASE}/models"))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| QueryError::from_reqwest(ProviderTag::Anthropic, e))?;
        let payload = check_http_response(ProviderTag::Anthropic, response).await?;
        serde_json::from_str(&payload).map_err(|e| QueryError::Parse {
            provider: ProviderTag::Anthropic,
            detail: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Provider for AnthropicProvider {
    async fn query(
        &self,
        model: &str,
        messages: &[Message],
        options: &QueryOptions,
    ) -> Result<String, QueryError> {
        let api_key = self.key()?;
        let model = strip_tag_prefix(model, ProviderTag::Anthropic);
        let body = build_request(model, messages, options.temperature);

        let response = self
            .client
            .post(format!("{ANTHROPIC_API_BASE}/messages"))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .timeout(options.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::from_reqwest(ProviderTag::Anthropic, e))?;

        let payload = check_http_response(ProviderTag::Anthropic, response).await?;
        parse_response(&payload)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, QueryError> {
        let api_key = self.key()?.to_owned();
        let listing = self.probe_models(&api_key).await?;
        let mut models: Vec<ModelInfo> = listing
            .data
            .into_iter()
            .map(|entry| ModelInfo {
                id: format!("anthropic:{}", entry.id),
                name: entry.display_name.unwrap_or_else(|| entry.id.clone()),
            })
            .collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(models)
    }

    async fn validate_key(&self, api_key: &str) -> KeyValidation {
        match self.probe_models(api_key).await {
            Ok(_) => KeyValidation {
                success: true,
                message: "API key is valid".to_owned(),
            },
            Err(QueryError::Status { status, .. }) => KeyValidation {
                success: false,
                message: format!("Invalid API key (status {status})"),
            },
            Err(e) => KeyValidation {
                success: false,
                message: e.to_string(),
            },
        }
    }

    fn tag(&self) -> ProviderTag {
        ProviderTag::Anthropic
    }
}
