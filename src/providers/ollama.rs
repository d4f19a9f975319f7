//! Ollama adapter using the local `/api/chat` API.
//!
//! No API key; the base URL comes from settings so remote Ollama hosts work
//! too. `stream` is pinned to `false` — the council protocol consumes whole
//! replies.

use serde::{Deserialize, Serialize};

use super::{
    check_http_response, strip_tag_prefix, KeyValidation, Message, ModelInfo, Provider,
    ProviderTag, QueryError, QueryOptions,
};

const PROBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// `/api/chat` request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct OllamaRequest {
    /// Model name with the provider prefix stripped.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<OllamaMessage>,
    /// Always `false`; whole replies only.
    pub stream: bool,
    /// Sampling options.
    pub options: OllamaOptions,
}

/// A message in Ollama chat format.
#[doc(hidden)]
#[derive(Debug, Serialize, Deserialize)]
pub struct OllamaMessage {
    /// Role (`system`, `user`, `assistant`).
    pub role: String,
    /// Plain text content.
    pub content: String,
}

/// Sampling options object.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct OllamaOptions {
    /// Sampling temperature.
    pub temperature: f64,
}

/// `/api/chat` response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OllamaResponse {
    /// Assistant reply.
    pub message: OllamaMessage,
}

/// `/api/tags` response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OllamaTagList {
    /// Locally available models.
    #[serde(default)]
    pub models: Vec<OllamaTagEntry>,
}

/// A single locally available model.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OllamaTagEntry {
    /// Model name (e.g. `llama3:8b`).
    pub name: String,
}

// ---------------------------------------------------------------------------
// Request / response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build an `/api/chat` request body.
#[doc(hidden)]
pub fn build_request(model: &str, messages: &[Message], temperature: f64) -> OllamaRequest {
    OllamaRequest {
        model: model.to_owned(),
        messages: messages
            .iter()
            .map(|m| OllamaMessage {
                role: m.role.as_str().to_owned(),
                content: m.content.clone(),
            })
            .collect(),
        stream: false,
        options: OllamaOptions { temperature },
    }
}

/// Parse an `/api/chat` response into the reply text.
///
/// # Errors
///
/// Returns [`QueryError::Parse`] when the body does not deserialize.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<String, QueryError> {
    let resp: OllamaResponse = serde_json::from_str(body).map_err(|e| QueryError::Parse {
        provider: ProviderTag::Ollama,
        detail: e.to_string(),
    })?;
    Ok(resp.message.content)
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Ollama chat API adapter.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create an Ollama adapter for the given base URL.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }
}

#[async_trait::async_trait]
impl Provider for OllamaProvider {
    async fn query(
        &self,
        model: &str,
        messages: &[Message],
        options: &QueryOptions,
    ) -> Result<String, QueryError> {
        let model = strip_tag_prefix(model, ProviderTag::Ollama);
        let body = build_request(model, messages, options.temperature);

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .header("content-type", "application/json")
            .timeout(options.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::from_reqwest(ProviderTag::Ollama, e))?;

        let payload = check_http_response(ProviderTag::Ollama, response).await?;
        parse_response(&payload)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, QueryError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| QueryError::from_reqwest(ProviderTag::Ollama, e))?;
        let payload = check_http_response(ProviderTag::Ollama, response).await?;
        let listing: OllamaTagList =
            serde_json::from_str(&payload).map_err(|e| QueryError::Parse {
                provider: ProviderTag::Ollama,
                detail: e.to_string(),
            })?;

        let mut models: Vec<ModelInfo> = listing
            .models
            .into_iter()
            .map(|entry| ModelInfo {
                id: format!("ollama:{}", entry.name),
                name: entry.name,
            })
            .collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(models)
    }

    async fn validate_key(&self, _api_key: &str) -> KeyValidation {
        // No key required; a reachable server is the validation.
        match self.list_models().await {
            Ok(_) => KeyValidation {
                success: true,
                message: "Ollama server is reachable (no API key required)".to_owned(),
            },
            Err(e) => KeyValidation {
                success: false,
                message: e.to_string(),
            },
        }
    }

    fn tag(&self) -> ProviderTag {
        ProviderTag::Ollama
    }
}
