//! Stored chunks and retrieval results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Chunk metadata as written by ingestion (`chunk_number`, `device_name`,
/// `issue_name`, `cli_command`). Ordered so rendering is deterministic.
pub type Metadata = BTreeMap<String, String>;

/// A stored unit of text plus its embedding and metadata.
///
/// Immutable once stored; the conversation core only ever reads chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source identifier assigned at ingestion time.
    pub id: String,

    /// The chunk text.
    pub text: String,

    /// Free-form string metadata.
    #[serde(default)]
    pub metadata: Metadata,

    /// The embedding. Present when writing; usually omitted from search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
            embedding: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// One nearest-neighbour match. Lower distance means more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub distance: f32,
}

/// The ordered top-k chunks for one query, most similar first.
///
/// Recomputed every turn and never cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<SearchHit>,
}

impl RetrievalResult {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.hits.iter().map(|h| &h.chunk)
    }
}
