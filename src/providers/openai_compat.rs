//! Adapter for OpenAI-compatible chat-completions APIs.
//!
//! OpenAI, Mistral, DeepSeek and OpenRouter all speak the same wire format:
//! `POST /chat/completions` with `Authorization: Bearer`, a
//! `{model, messages, temperature}` body, and the reply text at
//! `.choices[0].message.content`. One parameterised adapter serves all four;
//! the registry holds a distinct instance per backend.

use serde::{Deserialize, Serialize};

use super::{
    check_http_response, strip_tag_prefix, KeyValidation, Message, ModelInfo, Provider,
    ProviderTag, QueryError, QueryOptions,
};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const MISTRAL_API_BASE: &str = "https://api.mistral.ai/v1";
const DEEPSEEK_API_BASE: &str = "https://api.deepseek.com/v1";
const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Timeout for the cheap listing/validation probes.
const PROBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Chat completions request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model identifier with the provider prefix stripped.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f64,
}

/// A message in chat-completions format.
#[doc(hidden)]
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role (`system`, `user`, `assistant`).
    pub role: String,
    /// Plain text content.
    pub content: String,
}

/// Chat completions response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Response choices; only the first is read.
    pub choices: Vec<ChatChoice>,
}

/// A single response choice.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// Assistant message for this choice.
    pub message: ChatResponseMessage,
}

/// Assistant message within a choice.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct ChatResponseMessage {
    /// Reply text. Some gateways omit it on tool-only replies.
    pub content: Option<String>,
}

/// Model listing response body (`GET /models`).
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct ModelListResponse {
    /// Advertised models.
    #[serde(default)]
    pub data: Vec<ModelListEntry>,
}

/// A single advertised model.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct ModelListEntry {
    /// Raw model identifier.
    pub id: String,
}

// ---------------------------------------------------------------------------
// Request / response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build a chat-completions request body.
#[doc(hidden)]
pub fn build_request(model: &str, messages: &[Message], temperature: f64) -> ChatRequest {
    ChatRequest {
        model: model.to_owned(),
        messages: messages
            .iter()
            .map(|m| ChatMessage {
                role: m.role.as_str().to_owned(),
                content: m.content.clone(),
            })
            .collect(),
        temperature,
    }
}

/// Parse a chat-completions response body into the first choice's text.
///
/// # Errors
///
/// Returns [`QueryError::Parse`] when the body does not deserialize or has
/// no choices.
#[doc(hidden)]
pub fn parse_response(provider: ProviderTag, body: &str) -> Result<String, QueryError> {
    let resp: ChatResponse = serde_json::from_str(body).map_err(|e| QueryError::Parse {
        provider,
        detail: e.to_string(),
    })?;
    let choice = resp.choices.into_iter().next().ok_or(QueryError::Parse {
        provider,
        detail: "missing choices[0]".to_owned(),
    })?;
    Ok(choice.message.content.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Adapter for any OpenAI-compatible chat-completions backend.
#[derive(Debug, Clone)]
pub struct OpenAiCompatProvider {
    tag: ProviderTag,
    api_base: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// OpenAI adapter.
    pub fn openai(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self::new(ProviderTag::Openai, OPENAI_API_BASE, client, api_key)
    }

    /// Mistral adapter.
    pub fn mistral(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self::new(ProviderTag::Mistral, MISTRAL_API_BASE, client, api_key)
    }

    /// DeepSeek adapter.
    pub fn deepseek(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self::new(ProviderTag::Deepseek, DEEPSEEK_API_BASE, client, api_key)
    }

    /// OpenRouter adapter.
    pub fn openrouter(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self::new(ProviderTag::Openrouter, OPENROUTER_API_BASE, client, api_key)
    }

    fn new(
        tag: ProviderTag,
        api_base: &str,
        client: reqwest::Client,
        api_key: Option<String>,
    ) -> Self {
        Self {
            tag,
            api_base: api_base.to_owned(),
            api_key,
            client,
        }
    }

    fn key(&self) -> Result<&str, QueryError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(QueryError::MissingKey { provider: self.tag })
    }

    async fn probe_models(&self, api_key: &str) -> Result<ModelListResponse, QueryError> {
        let response = self
            .client
            .get(format!("{}/models", self.api_base))
            .bearer_auth(api_key)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| QueryError::from_reqwest(self.tag, e))?;
        let payload = check_http_response(self.tag, response).await?;
        serde_json::from_str(&payload).map_err(|e| QueryError::Parse {
            provider: self.tag,
            detail: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiCompatProvider {
    async fn query(
        &self,
        model: &str,
        messages: &[Message],
        options: &QueryOptions,
    ) -> Result<String, QueryError> {
        let api_key = self.key()?;
        let model = strip_tag_prefix(model, self.tag);
        let body = build_request(model, messages, options.temperature);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("content-type", "application/json")
            .bearer_auth(api_key)
            .timeout(options.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::from_reqwest(self.tag, e))?;

        let payload = check_http_response(self.tag, response).await?;
        parse_response(self.tag, &payload)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, QueryError> {
        let api_key = self.key()?.to_owned();
        let listing = self.probe_models(&api_key).await?;
        let mut models: Vec<ModelInfo> = listing
            .data
            .into_iter()
            .map(|entry| ModelInfo {
                id: format!("{}:{}", self.tag, entry.id),
                name: entry.id,
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
        self.tag
    }
}
