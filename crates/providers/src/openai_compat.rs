//! Chat completions and embeddings over the OpenAI wire format.
//!
//! Serves OpenAI itself plus any server that mirrors `/chat/completions`,
//! `/embeddings` and `/models` (Ollama, vLLM, OpenRouter, text-embeddings
//! servers).

use async_trait::async_trait;
use issuespilot_core::error::ProviderError;
use issuespilot_core::message::Message;
use issuespilot_core::provider::{
    EmbeddingRequest, EmbeddingResponse, ProviderRequest, ProviderResponse, Usage,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::http::{build_client, check_status, transport_error};

pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// `name` is used in logs and errors only; `api_key` may be absent for
    /// local servers.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: build_client(timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/{path}", self.base_url));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// POST `body` to `path` and decode a 2xx reply as `T`.
    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(&self.name, response).await?;

        response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("{}: unreadable {path} response: {e}", self.name),
        })
    }

    fn completion_from(api: ChatResponse) -> Result<ProviderResponse, ProviderError> {
        let Some(choice) = api.choices.into_iter().next() else {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: "completion returned no choices".into(),
            });
        };

        Ok(ProviderResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            usage: api.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: api.model,
        })
    }

    fn embeddings_from(api: EmbeddingsResponse) -> EmbeddingResponse {
        let mut rows = api.data;
        // `index` is authoritative; some servers reorder rows.
        rows.sort_by_key(|row| row.index);

        EmbeddingResponse {
            embeddings: rows.into_iter().map(|row| row.embedding).collect(),
            model: api.model,
            usage: api.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: 0,
                total_tokens: u.total_tokens,
            }),
        }
    }
}

#[async_trait]
impl issuespilot_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = ChatRequest {
            model: &request.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = body.messages.len(),
            "Sending completion request"
        );

        let api: ChatResponse = self.post("chat/completions", &body).await?;
        Self::completion_from(api)
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        let body = EmbeddingsRequest {
            model: &request.model,
            input: &request.inputs,
            encoding_format: "float",
        };

        debug!(
            provider = %self.name,
            model = %request.model,
            count = request.inputs.len(),
            "Sending embedding request"
        );

        let api: EmbeddingsResponse = self.post("embeddings", &body).await?;
        let parsed = Self::embeddings_from(api);

        if parsed.embeddings.len() != request.inputs.len() {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: format!(
                    "{} inputs but {} embeddings returned",
                    request.inputs.len(),
                    parsed.embeddings.len()
                ),
            });
        }
        Ok(parsed)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let response = self
            .request(reqwest::Method::GET, "models")
            .send()
            .await
            .map_err(transport_error)?;
        Ok(response.status().is_success())
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(m: &'a Message) -> Self {
        Self {
            role: m.role.as_str(),
            content: &m.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
    model: String,
    usage: Option<EmbeddingsUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}
