//! Embedder backed by a provider's embeddings endpoint.

use async_trait::async_trait;
use issuespilot_core::Embedder;
use issuespilot_core::error::ProviderError;
use issuespilot_core::provider::{EmbeddingRequest, Provider};
use std::sync::Arc;
use tracing::debug;

/// Adapts any [`Provider`] that supports `embed` to the [`Embedder`] seam.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: texts.to_vec(),
            })
            .await?;

        debug!(
            model = %self.model,
            count = response.embeddings.len(),
            dim = response.embeddings.first().map(Vec::len).unwrap_or(0),
            "Embedded texts"
        );

        Ok(response.embeddings)
    }
}
