//! In-process index: useful for testing and offline sessions.

use async_trait::async_trait;
use issuespilot_core::error::IndexError;
use issuespilot_core::index::{CollectionInfo, VectorIndex};
use issuespilot_core::{Chunk, SearchHit};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::vector::rank_by_distance;

struct Collection {
    id: String,
    dimension: Option<usize>,
    chunks: Vec<Chunk>,
}

/// An index that keeps every collection in memory.
///
/// Ranking uses cosine distance; ties keep insertion order.
pub struct InMemoryIndex {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn heartbeat(&self) -> Result<u64, IndexError> {
        Ok(std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default())
    }

    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionInfo, IndexError> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Collection {
                id: Uuid::new_v4().to_string(),
                dimension: None,
                chunks: Vec::new(),
            });
        Ok(CollectionInfo {
            id: collection.id.clone(),
            name: name.to_string(),
        })
    }

    async fn delete_collection(&self, name: &str) -> Result<(), IndexError> {
        self.collections
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))
    }

    async fn add(&self, collection: &str, chunks: Vec<Chunk>) -> Result<(), IndexError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;

        // Validate the whole batch before touching the collection.
        let mut dimension = target.dimension;
        for chunk in &chunks {
            let emb = chunk.embedding.as_ref().ok_or_else(|| {
                IndexError::InvalidResponse(format!("chunk {} has no embedding", chunk.id))
            })?;
            match dimension {
                Some(expected) if expected != emb.len() => {
                    return Err(IndexError::DimensionMismatch {
                        expected,
                        actual: emb.len(),
                    });
                }
                Some(_) => {}
                None => dimension = Some(emb.len()),
            }
        }

        target.dimension = dimension;
        target.chunks.extend(chunks);
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize, IndexError> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.chunks.len())
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))
    }

    async fn similarity_search(
        &self,
        collection: &str,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;

        if let Some(expected) = target.dimension {
            if expected != query_vector.len() {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: query_vector.len(),
                });
            }
        }

        Ok(rank_by_distance(&target.chunks, query_vector, k))
    }
}
