//! Claude over Anthropic's native Messages API.
//!
//! Differs from the OpenAI format in three ways: the key travels in
//! `x-api-key`, every request pins `anthropic-version`, and system text is a
//! top-level `system` field rather than a message.

use async_trait::async_trait;
use issuespilot_core::error::ProviderError;
use issuespilot_core::message::{Message, Role};
use issuespilot_core::provider::{ProviderRequest, ProviderResponse, Usage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::http::{build_client, check_status, transport_error};

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub(crate) const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
/// The Messages API requires `max_tokens` on every request.
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: build_client(timeout)?,
        })
    }

    /// Point at a proxy or a local mock instead of api.anthropic.com.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/{path}", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }

    /// Split system messages out of the conversation. Several system
    /// messages are joined with a blank line.
    fn split_system(messages: &[Message]) -> (Option<String>, Vec<WireMessage<'_>>) {
        let (system, turns): (Vec<&Message>, Vec<&Message>) =
            messages.iter().partition(|m| m.role == Role::System);

        let system = (!system.is_empty()).then(|| {
            system
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
        });

        let turns = turns
            .into_iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect();

        (system, turns)
    }

    fn response_from(api: MessagesResponse) -> ProviderResponse {
        let text = api
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: api.usage.input_tokens,
                completion_tokens: api.usage.output_tokens,
                total_tokens: api.usage.input_tokens + api.usage.output_tokens,
            }),
            model: api.model,
        }
    }
}

#[async_trait]
impl issuespilot_core::Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let (system, messages) = Self::split_system(&request.messages);
        let body = MessagesRequest {
            model: &request.model,
            system,
            messages,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
        };

        debug!(
            provider = "anthropic",
            model = %request.model,
            messages = body.messages.len(),
            "Sending completion request"
        );

        let response = self
            .request(reqwest::Method::POST, "v1/messages")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status("anthropic", response).await?;

        let api: MessagesResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("anthropic: unreadable messages response: {e}"),
        })?;

        Ok(Self::response_from(api))
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let response = self
            .request(reqwest::Method::GET, "v1/models")
            .send()
            .await
            .map_err(transport_error)?;
        Ok(response.status().is_success())
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}
