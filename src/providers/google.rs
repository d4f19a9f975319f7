//! Google Gemini adapter using the `generateContent` API.
//!
//! The key travels as a `key` query parameter, conversation turns use the
//! `contents[].parts[].text` shape with the `model` role for assistant
//! turns, and system messages are lifted into `systemInstruction`.

use serde::{Deserialize, Serialize};

use super::{
    check_http_response, strip_tag_prefix, KeyValidation, Message, ModelInfo, Provider,
    ProviderTag, QueryError, QueryOptions, Role,
};

const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const PROBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// `generateContent` request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleRequest {
    /// Conversation turns.
    pub contents: Vec<GoogleContent>,
    /// Lifted system messages, when any were supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GoogleContent>,
    /// Generation parameters.
    pub generation_config: GoogleGenerationConfig,
}

/// A conversation turn.
#[doc(hidden)]
#[derive(Debug, Serialize, Deserialize)]
pub struct GoogleContent {
    /// Turn role (`user` or `model`); absent on system instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts.
    pub parts: Vec<GooglePart>,
}

/// A single text part.
#[doc(hidden)]
#[derive(Debug, Serialize, Deserialize)]
pub struct GooglePart {
    /// Text payload.
    pub text: String,
}

/// Generation parameters.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct GoogleGenerationConfig {
    /// Sampling temperature.
    pub temperature: f64,
}

/// `generateContent` response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct GoogleResponse {
    /// Response candidates; only the first is read.
    #[serde(default)]
    pub candidates: Vec<GoogleCandidate>,
}

/// A single response candidate.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct GoogleCandidate {
    /// Candidate content.
    pub content: GoogleContent,
}

/// Model listing response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct GoogleModelList {
    /// Advertised models.
    #[serde(default)]
    pub models: Vec<GoogleModelEntry>,
}

/// A single advertised model.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleModelEntry {
    /// Resource name (`models/<id>`).
    pub name: String,
    /// Display name, when provided.
    #[serde(default)]
    pub display_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Request / response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build a `generateContent` request from a message list.
#[doc(hidden)]
pub fn build_request(messages: &[Message], temperature: f64) -> GoogleRequest {
    let mut system_parts: Vec<GooglePart> = Vec::new();
    let mut contents: Vec<GoogleContent> = Vec::new();

    for message in messages {
        match message.role {
            Role::System => system_parts.push(GooglePart {
                text: message.content.clone(),
            }),
            Role::User | Role::Assistant => contents.push(GoogleContent {
                role: Some(google_role(message.role).to_owned()),
                parts: vec![GooglePart {
                    text: message.content.clone(),
                }],
            }),
        }
    }

    GoogleRequest {
        contents,
        system_instruction: if system_parts.is_empty() {
            None
        } else {
            Some(GoogleContent {
                role: None,
                parts: system_parts,
            })
        },
        generation_config: GoogleGenerationConfig { temperature },
    }
}

/// Parse a `generateContent` response into the first candidate's text.
///
/// # Errors
///
/// Returns [`QueryError::Parse`] when the body does not deserialize or has
/// no candidates.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<String, QueryError> {
    let resp: GoogleResponse = serde_json::from_str(body).map_err(|e| QueryError::Parse {
        provider: ProviderTag::Google,
        detail: e.to_string(),
    })?;

    let candidate = resp.candidates.into_iter().next().ok_or(QueryError::Parse {
        provider: ProviderTag::Google,
        detail: "missing candidates[0]".to_owned(),
    })?;

    let mut text = String::new();
    for part in candidate.content.parts {
        text.push_str(&part.text);
    }
    Ok(text)
}

fn google_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::System | Role::User => "user",
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Google Gemini `generateContent` adapter.
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GoogleProvider {
    /// Create a Google adapter sharing the process HTTP client.
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { api_key, client }
    }

    fn key(&self) -> Result<&str, QueryError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(QueryError::MissingKey {
                provider: ProviderTag::Google,
            })
    }

    async fn probe_models(&self, api_key: &str) -> Result<GoogleModelList, QueryError> {
        let response = self
            .client
            .get(format!("{GOOGLE_API_BASE}/models"))
            .query(&[("key", api_key)])
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| QueryError::from_reqwest(ProviderTag::Google, e))?;
        let payload = check_http_response(ProviderTag::Google, response).await?;
        serde_json::from_str(&payload).map_err(|e| QueryError::Parse {
            provider: ProviderTag::Google,
            detail: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Provider for GoogleProvider {
    async fn query(
        &self,
        model: &str,
        messages: &[Message],
        options: &QueryOptions,
    ) -> Result<String, QueryError> {
        let api_key = self.key()?;
        let model = strip_tag_prefix(model, ProviderTag::Google);
        let body = build_request(messages, options.temperature);

        let response = self
            .client
            .post(format!("{GOOGLE_API_BASE}/models/{model}:generateContent"))
            .query(&[("key", api_key)])
            .header("content-type", "application/json")
            .timeout(options.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::from_reqwest(ProviderTag::Google, e))?;

        let payload = check_http_response(ProviderTag::Google, response).await?;
        parse_response(&payload)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, QueryError> {
        let api_key = self.key()?.to_owned();
        let listing = self.probe_models(&api_key).await?;
        let mut models: Vec<ModelInfo> = listing
            .models
            .into_iter()
            .map(|entry| {
                let id = entry
                    .name
                    .strip_prefix("models/")
                    .unwrap_or(&entry.name)
                    .to_owned();
                ModelInfo {
                    id: format!("google:{id}"),
                    name: entry.display_name.unwrap_or(id),
                }
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
        ProviderTag::Google
    }
}
