//! Shared test fakes for the conversation pipeline.

use async_trait::async_trait;
use issuespilot_core::error::{IndexError, ProviderError};
use issuespilot_core::index::{CollectionInfo, VectorIndex};
use issuespilot_core::message::Message;
use issuespilot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use issuespilot_core::{Chunk, Embedder, SearchHit};
use issuespilot_index::InMemoryIndex;
use std::sync::{Arc, Mutex};

pub const COLLECTION: &str = "network_issues";

/// A mock provider that answers with scripted results in sequence and
/// records every request it receives.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(make_text_response(t))).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("SequentialMockProvider: no more responses");
        }
        responses.remove(0)
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Deterministic bag-of-keywords embedder: one dimension per keyword.
pub struct KeywordEmbedder {
    keywords: Vec<&'static str>,
    calls: Mutex<usize>,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            keywords: vec!["pdx-ro", "bgp", "interface", "cpu", "ospf"],
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = self
            .keywords
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect();
        // Bias term keeps every vector non-zero.
        v.push(0.1);
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model(&self) -> &str {
        "keyword-mock"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// An embedder whose model endpoint always fails.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model(&self) -> &str {
        "failing"
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::ApiError {
            status_code: 422,
            message: "input cannot be tokenized".into(),
        })
    }
}

/// A vector store that cannot be reached.
pub struct UnreachableIndex {
    pub searches: Mutex<usize>,
}

impl UnreachableIndex {
    pub fn new() -> Self {
        Self {
            searches: Mutex::new(0),
        }
    }
}

#[async_trait]
impl VectorIndex for UnreachableIndex {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn heartbeat(&self) -> Result<u64, IndexError> {
        Err(IndexError::Unavailable("connection refused".into()))
    }

    async fn get_or_create_collection(&self, _name: &str) -> Result<CollectionInfo, IndexError> {
        Err(IndexError::Unavailable("connection refused".into()))
    }

    async fn delete_collection(&self, _name: &str) -> Result<(), IndexError> {
        Err(IndexError::Unavailable("connection refused".into()))
    }

    async fn add(&self, _collection: &str, _chunks: Vec<Chunk>) -> Result<(), IndexError> {
        Err(IndexError::Unavailable("connection refused".into()))
    }

    async fn count(&self, _collection: &str) -> Result<usize, IndexError> {
        Err(IndexError::Unavailable("connection refused".into()))
    }

    async fn similarity_search(
        &self,
        _collection: &str,
        _query_vector: &[f32],
        _k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        *self.searches.lock().unwrap() += 1;
        Err(IndexError::Unavailable("connection refused".into()))
    }
}

/// An in-process index seeded with network troubleshooting chunks.
pub async fn seeded_index(embedder: &KeywordEmbedder) -> Arc<InMemoryIndex> {
    let index = Arc::new(InMemoryIndex::new());
    index.get_or_create_collection(COLLECTION).await.unwrap();

    let texts = [
        "PDX-RO hostname PDX-RO location Global/OR/PDX/Floor-2 role BORDER ROUTER",
        "PDX-RO BGP neighbor 10.93.141.1 state Idle",
        "PDX-RO interface GigabitEthernet0/0/2 down/down",
        "NYC-SW1 CPU utilization 95 percent",
        "NYC-SW1 OSPF adjacency stuck in EXSTART",
    ];
    let chunks = texts
        .iter()
        .enumerate()
        .map(|(i, t)| {
            Chunk::new(format!("chunk-{i}"), *t)
                .with_metadata("chunk_number", (i + 1).to_string())
                .with_embedding(embedder.vector(t))
        })
        .collect();
    index.add(COLLECTION, chunks).await.unwrap();
    index
}
