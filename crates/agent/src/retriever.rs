//! Retriever: embed the query, then ask the index for its nearest chunks.

use std::sync::Arc;

use issuespilot_core::{Embedder, Error, RetrievalResult, VectorIndex};
use tracing::debug;

/// Top-k similarity retrieval over one named collection.
///
/// Purely a read: no caching, no retries. Embedding failures surface as
/// [`Error::Embedding`], an unreachable store as [`Error::IndexUnavailable`].
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    collection: String,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The `k` chunks nearest to `query`, most similar first.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, Error> {
        if query.trim().is_empty() {
            return Err(Error::Internal("retrieve called with an empty query".into()));
        }
        if k == 0 {
            return Err(Error::config("retrieval k must be greater than zero"));
        }

        let vector = self
            .embedder
            .encode(query)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let hits = self
            .index
            .similarity_search(&self.collection, &vector, k)
            .await?;

        debug!(
            collection = %self.collection,
            index = self.index.name(),
            k,
            hits = hits.len(),
            "Retrieved chunks"
        );

        Ok(RetrievalResult::new(hits))
    }
}
