//! Embedder trait: text to fixed-length vectors.
//!
//! The embedding model is a black box; implementations call out to a hosted
//! or local embeddings endpoint.

use async_trait::async_trait;

use crate::error::ProviderError;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// The embedding model name (e.g., "all-MiniLM-L6-v2").
    fn model(&self) -> &str;

    /// Embed a batch of texts. Returns one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Embed a single text.
    async fn encode(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "embedding response contained no vectors".into(),
            })
    }
}
