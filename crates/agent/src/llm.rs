//! LlmClient: send an assembled prompt to the hosted model.

use std::sync::Arc;

use issuespilot_core::{Error, Prompt, Provider, ProviderRequest};
use tracing::{debug, info};

/// Thin adapter from [`Prompt`] to a provider request for a fixed model.
pub struct LlmClient {
    provider: Arc<dyn Provider>,
    model: String,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Generate the answer text. Provider failures are classified into the
    /// error taxonomy (rate limit, auth, model availability, context overflow).
    pub async fn generate(
        &self,
        prompt: &Prompt,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, Error> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: prompt.to_messages(),
            temperature,
            max_tokens: Some(max_tokens),
        };

        debug!(
            provider = self.provider.name(),
            model = %self.model,
            messages = request.messages.len(),
            context_chunks = prompt.context.len(),
            "Generating answer"
        );

        let response = self.provider.complete(request).await?;

        if let Some(usage) = &response.usage {
            info!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Answer generated"
            );
        }

        Ok(response.message.content)
    }
}
