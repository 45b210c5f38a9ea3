//! VectorIndex trait: the remote (vector, text, metadata) store.
//!
//! Implementations: Chroma over HTTP, and an in-process index used for tests
//! and offline runs. The persistence format is the store's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, SearchHit};
use crate::error::IndexError;

/// A named collection as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Store-assigned identifier.
    pub id: String,
    /// Collection name.
    pub name: String,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name (e.g., "chroma", "in_memory").
    fn name(&self) -> &str;

    /// Liveness check. Returns the server's heartbeat value.
    async fn heartbeat(&self) -> Result<u64, IndexError>;

    /// Fetch a collection, creating it if it does not exist.
    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionInfo, IndexError>;

    /// Delete a collection and everything in it.
    async fn delete_collection(&self, name: &str) -> Result<(), IndexError>;

    /// Store chunks. Every chunk must carry an embedding.
    async fn add(&self, collection: &str, chunks: Vec<Chunk>) -> Result<(), IndexError>;

    /// Number of chunks in a collection.
    async fn count(&self, collection: &str) -> Result<usize, IndexError>;

    /// The `k` nearest chunks to `query_vector`, closest first.
    async fn similarity_search(
        &self,
        collection: &str,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, IndexError>;
}
