//! Chroma vector store over its HTTP API (v2 routes).
//!
//! Collections are addressed by name at the API surface and by id on the
//! wire; ids are resolved once and cached until Chroma reports them gone.

use async_trait::async_trait;
use issuespilot_core::error::IndexError;
use issuespilot_core::index::{CollectionInfo, VectorIndex};
use issuespilot_core::{Chunk, Metadata, SearchHit};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const DEFAULT_TENANT: &str = "default_tenant";
const DEFAULT_DATABASE: &str = "default_database";

/// A Chroma server reachable over HTTP.
pub struct ChromaIndex {
    base_url: String,
    tenant: String,
    database: String,
    client: reqwest::Client,
    collection_ids: RwLock<HashMap<String, String>>,
}

impl ChromaIndex {
    /// Connect to a Chroma server at `base_url` (e.g. `http://localhost:8000`).
    ///
    /// No request is made until the first call.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Unavailable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tenant: DEFAULT_TENANT.into(),
            database: DEFAULT_DATABASE.into(),
            client,
            collection_ids: RwLock::new(HashMap::new()),
        })
    }

    /// Use a non-default tenant and database.
    pub fn with_tenant(mut self, tenant: impl Into<String>, database: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self.database = database.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, self.tenant, self.database
        )
    }

    /// `collections_url` plus percent-encoded path segments.
    fn collection_url(&self, segments: &[&str]) -> Result<reqwest::Url, IndexError> {
        let mut url = reqwest::Url::parse(&self.collections_url())
            .map_err(|e| IndexError::Unavailable(format!("invalid Chroma URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| IndexError::Unavailable(format!("invalid Chroma URL: {}", self.base_url)))?
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, IndexError> {
        request.send().await.map_err(|e| {
            warn!(url = %self.base_url, error = %e, "Chroma request failed");
            IndexError::Unavailable(e.to_string())
        })
    }

    /// Resolve a collection name to its id. The flag is true when the id came
    /// from the cache.
    async fn collection_id(&self, name: &str) -> Result<(String, bool), IndexError> {
        if let Some(id) = self.collection_ids.read().await.get(name) {
            return Ok((id.clone(), true));
        }

        let url = self.collection_url(&[name])?;
        let response = self.send(self.client.get(url)).await?;
        let response = check_status(response, Some(name)).await?;
        let collection: ApiCollection = parse_json(response).await?;

        self.collection_ids
            .write()
            .await
            .insert(name.to_string(), collection.id.clone());
        Ok((collection.id, false))
    }

    /// Run an id-addressed request against collection `name`.
    ///
    /// A cached id can go stale when the collection is dropped and recreated
    /// by another process; on `CollectionNotFound` the id is resolved again
    /// and the request is sent once more.
    async fn on_collection<T, F, Fut>(&self, name: &str, request: F) -> Result<T, IndexError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, IndexError>>,
    {
        let (id, cached) = self.collection_id(name).await?;
        match request(id).await {
            Err(IndexError::CollectionNotFound(_)) if cached => {
                warn!(collection = name, "Cached collection id is stale, resolving again");
                self.collection_ids.write().await.remove(name);
                let (id, _) = self.collection_id(name).await?;
                request(id).await
            }
            result => result,
        }
    }
}

#[async_trait]
impl VectorIndex for ChromaIndex {
    fn name(&self) -> &str {
        "chroma"
    }

    async fn heartbeat(&self) -> Result<u64, IndexError> {
        let url = format!("{}/api/v2/heartbeat", self.base_url);
        let response = self.send(self.client.get(&url)).await?;
        let response = check_status(response, None).await?;
        let beat: ApiHeartbeat = parse_json(response).await?;
        Ok(beat.nanosecond_heartbeat)
    }

    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionInfo, IndexError> {
        let body = serde_json::json!({
            "name": name,
            "get_or_create": true,
        });

        let response = self
            .send(self.client.post(self.collections_url()).json(&body))
            .await?;
        let response = check_status(response, Some(name)).await?;
        let collection: ApiCollection = parse_json(response).await?;

        debug!(collection = %collection.name, id = %collection.id, "Collection ready");

        self.collection_ids
            .write()
            .await
            .insert(collection.name.clone(), collection.id.clone());

        Ok(CollectionInfo {
            id: collection.id,
            name: collection.name,
        })
    }

    async fn delete_collection(&self, name: &str) -> Result<(), IndexError> {
        let url = self.collection_url(&[name])?;
        let response = self.send(self.client.delete(url)).await?;
        check_status(response, Some(name)).await?;
        self.collection_ids.write().await.remove(name);
        debug!(collection = name, "Collection deleted");
        Ok(())
    }

    async fn add(&self, collection: &str, chunks: Vec<Chunk>) -> Result<(), IndexError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let batch = AddRequest::from_chunks(chunks)?;
        let count = batch.ids.len();

        let batch = &batch;
        self.on_collection(collection, move |id| async move {
            let url = self.collection_url(&[id.as_str(), "add"])?;
            let response = self.send(self.client.post(url).json(batch)).await?;
            check_status(response, Some(collection)).await.map(drop)
        })
        .await?;

        debug!(collection, count, "Added chunks");
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize, IndexError> {
        self.on_collection(collection, move |id| async move {
            let url = self.collection_url(&[id.as_str(), "count"])?;
            let response = self.send(self.client.get(url)).await?;
            let response = check_status(response, Some(collection)).await?;
            parse_json(response).await
        })
        .await
    }

    async fn similarity_search(
        &self,
        collection: &str,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let body = serde_json::json!({
            "query_embeddings": [query_vector],
            "n_results": k,
            "include": ["documents", "metadatas", "distances"],
        });

        debug!(collection, k, dim = query_vector.len(), "Querying Chroma");

        let body = &body;
        let result: QueryResponse = self
            .on_collection(collection, move |id| async move {
                let url = self.collection_url(&[id.as_str(), "query"])?;
                let response = self.send(self.client.post(url).json(body)).await?;
                let response = check_status(response, Some(collection)).await?;
                parse_json(response).await
            })
            .await?;

        result.into_hits()
    }
}

/// Map a non-success status to an [`IndexError`]; pass 2xx through.
async fn check_status(
    response: reqwest::Response,
    collection: Option<&str>,
) -> Result<reqwest::Response, IndexError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status, body = %body, "Chroma returned error");

    match (status, collection) {
        (404, Some(name)) => Err(IndexError::CollectionNotFound(name.to_string())),
        (400, Some(name)) if body.contains("does not exist") => {
            Err(IndexError::CollectionNotFound(name.to_string()))
        }
        (502..=504, _) => Err(IndexError::Unavailable(format!("status {status}: {body}"))),
        _ => Err(IndexError::RequestFailed {
            status_code: status,
            message: body,
        }),
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, IndexError> {
    response
        .json()
        .await
        .map_err(|e| IndexError::InvalidResponse(e.to_string()))
}

/// Chroma metadata values may be strings, numbers or booleans.
fn metadata_from_json(map: serde_json::Map<String, serde_json::Value>) -> Metadata {
    map.into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

// --- Chroma API types ---

#[derive(Debug, Deserialize)]
struct ApiHeartbeat {
    #[serde(rename = "nanosecond heartbeat")]
    nanosecond_heartbeat: u64,
}

#[derive(Debug, Deserialize)]
struct ApiCollection {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct AddRequest {
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    documents: Vec<String>,
    metadatas: Vec<Option<Metadata>>,
}

impl AddRequest {
    fn from_chunks(chunks: Vec<Chunk>) -> Result<Self, IndexError> {
        let mut batch = Self {
            ids: Vec::with_capacity(chunks.len()),
            embeddings: Vec::with_capacity(chunks.len()),
            documents: Vec::with_capacity(chunks.len()),
            metadatas: Vec::with_capacity(chunks.len()),
        };

        for chunk in chunks {
            let embedding = chunk.embedding.ok_or_else(|| {
                IndexError::InvalidResponse(format!("chunk {} has no embedding", chunk.id))
            })?;
            batch.ids.push(chunk.id);
            batch.embeddings.push(embedding);
            batch.documents.push(chunk.text);
            batch.metadatas.push(if chunk.metadata.is_empty() {
                None
            } else {
                Some(chunk.metadata)
            });
        }

        Ok(batch)
    }
}

/// Column-oriented query result; the outer list has one entry per query vector.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<serde_json::Map<String, serde_json::Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

impl QueryResponse {
    fn into_hits(self) -> Result<Vec<SearchHit>, IndexError> {
        let ids = self.ids.into_iter().next().unwrap_or_default();
        let mut documents = first_row(self.documents).into_iter();
        let mut metadatas = first_row(self.metadatas).into_iter();
        let mut distances = first_row(self.distances).into_iter();

        ids.into_iter()
            .map(|id| {
                let text = documents.next().flatten().ok_or_else(|| {
                    IndexError::InvalidResponse(format!("no document for id {id}"))
                })?;
                let metadata = metadatas
                    .next()
                    .flatten()
                    .map(metadata_from_json)
                    .unwrap_or_default();
                let distance = distances.next().flatten().unwrap_or(f32::MAX);

                Ok(SearchHit {
                    chunk: Chunk {
                        id,
                        text,
                        metadata,
                        embedding: None,
                    },
                    distance,
                })
            })
            .collect()
    }
}

fn first_row<T>(column: Option<Vec<Vec<T>>>) -> Vec<T> {
    column
        .and_then(|rows| rows.into_iter().next())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MockState {
        added: Arc<Mutex<Vec<serde_json::Value>>>,
        queries: Arc<Mutex<Vec<serde_json::Value>>>,
        lookups: Arc<Mutex<usize>>,
    }

    const PREFIX: &str = "/api/v2/tenants/{tenant}/databases/{database}/collections";

    async fn heartbeat() -> Json<serde_json::Value> {
        Json(serde_json::json!({"nanosecond heartbeat": 1_700_000_000_000_000_000u64}))
    }

    async fn create(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
        Json(serde_json::json!({"id": "col-1", "name": body["name"], "metadata": null}))
    }

    async fn lookup(
        State(state): State<MockState>,
        Path(params): Path<HashMap<String, String>>,
    ) -> axum::response::Response {
        *state.lookups.lock().unwrap() += 1;
        match params.get("collection").map(String::as_str) {
            Some("issues") => Json(serde_json::json!({"id": "col-1", "name": "issues"}))
                .into_response(),
            Some("core#1 issues?") => {
                Json(serde_json::json!({"id": "col-7", "name": "core#1 issues?"}))
                    .into_response()
            }
            _ => (StatusCode::NOT_FOUND, "Collection does not exist").into_response(),
        }
    }

    async fn delete() -> Json<serde_json::Value> {
        Json(serde_json::json!({}))
    }

    async fn add(
        State(state): State<MockState>,
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        state.added.lock().unwrap().push(body);
        (StatusCode::CREATED, Json(serde_json::json!({})))
    }

    async fn count() -> Json<usize> {
        Json(3)
    }

    async fn query(
        State(state): State<MockState>,
        Json(body): Json<serde_json::Value>,
    ) -> Json<serde_json::Value> {
        state.queries.lock().unwrap().push(body);
        Json(serde_json::json!({
            "ids": [["c2", "c1"]],
            "documents": [["BGP neighbor 10.0.0.2 Idle", "Gi0/1 down/down"]],
            "metadatas": [[
                {"device_name": "PDX-RO", "chunk_number": 2},
                null
            ]],
            "distances": [[0.12, 0.34]],
            "embeddings": null,
            "include": ["documents", "metadatas", "distances"]
        }))
    }

    async fn spawn_mock() -> (String, MockState) {
        let state = MockState::default();
        let app = Router::new()
            .route("/api/v2/heartbeat", get(heartbeat))
            .route(PREFIX, post(create))
            .route(&format!("{PREFIX}/{{collection}}"), get(lookup).delete(delete))
            .route(&format!("{PREFIX}/{{collection}}/add"), post(add))
            .route(&format!("{PREFIX}/{{collection}}/count"), get(count))
            .route(&format!("{PREFIX}/{{collection}}/query"), post(query))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), state)
    }

    fn index(url: &str) -> ChromaIndex {
        ChromaIndex::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn heartbeat_reads_nanoseconds() {
        let (url, _) = spawn_mock().await;
        let beat = index(&url).heartbeat().await.unwrap();
        assert_eq!(beat, 1_700_000_000_000_000_000);
    }

    #[tokio::test]
    async fn create_caches_collection_id() {
        let (url, state) = spawn_mock().await;
        let chroma = index(&url);

        let info = chroma.get_or_create_collection("issues").await.unwrap();
        assert_eq!(info.id, "col-1");
        assert_eq!(info.name, "issues");

        assert_eq!(chroma.count("issues").await.unwrap(), 3);
        assert_eq!(*state.lookups.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn query_returns_hits_in_server_order() {
        let (url, state) = spawn_mock().await;
        let chroma = index(&url);

        let hits = chroma
            .similarity_search("issues", &[0.1, 0.2, 0.3], 8)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.id, "c2");
        assert_eq!(hits[0].chunk.text, "BGP neighbor 10.0.0.2 Idle");
        assert_eq!(hits[0].chunk.metadata["device_name"], "PDX-RO");
        assert_eq!(hits[0].chunk.metadata["chunk_number"], "2");
        assert!((hits[0].distance - 0.12).abs() < 1e-6);
        assert!(hits[1].chunk.metadata.is_empty());

        let queries = state.queries.lock().unwrap();
        assert_eq!(queries[0]["n_results"], 8);
        assert_eq!(queries[0]["query_embeddings"][0].as_array().unwrap().len(), 3);
        assert_eq!(*state.lookups.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn add_sends_column_batch() {
        let (url, state) = spawn_mock().await;
        let chroma = index(&url);

        chroma
            .add(
                "issues",
                vec![
                    Chunk::new("u1", "first")
                        .with_metadata("chunk_number", "1")
                        .with_embedding(vec![1.0, 0.0]),
                    Chunk::new("u2", "second").with_embedding(vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let added = state.added.lock().unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0]["ids"], serde_json::json!(["u1", "u2"]));
        assert_eq!(added[0]["documents"], serde_json::json!(["first", "second"]));
        assert_eq!(added[0]["metadatas"][0]["chunk_number"], "1");
        assert!(added[0]["metadatas"][1].is_null());
    }

    #[tokio::test]
    async fn unknown_collection_is_not_found() {
        let (url, _) = spawn_mock().await;
        let err = index(&url).count("missing").await.unwrap_err();
        assert!(matches!(err, IndexError::CollectionNotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn delete_forgets_cached_id() {
        let (url, state) = spawn_mock().await;
        let chroma = index(&url);
        chroma.get_or_create_collection("issues").await.unwrap();
        chroma.delete_collection("issues").await.unwrap();

        chroma.count("issues").await.unwrap();
        assert_eq!(*state.lookups.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn reserved_characters_in_name_are_encoded() {
        let (url, state) = spawn_mock().await;
        let chroma = index(&url);

        assert_eq!(chroma.count("core#1 issues?").await.unwrap(), 3);
        assert_eq!(*state.lookups.lock().unwrap(), 1);
    }

    #[derive(Clone, Default)]
    struct RecreatedState {
        lookups: Arc<Mutex<usize>>,
        queried_ids: Arc<Mutex<Vec<String>>>,
    }

    /// Chroma after the collection was dropped and recreated elsewhere: the
    /// create call still hands out `col-1`, but only `col-2` exists now.
    async fn spawn_recreated() -> (String, RecreatedState) {
        async fn create() -> Json<serde_json::Value> {
            Json(serde_json::json!({"id": "col-1", "name": "issues"}))
        }

        async fn lookup(State(state): State<RecreatedState>) -> Json<serde_json::Value> {
            *state.lookups.lock().unwrap() += 1;
            Json(serde_json::json!({"id": "col-2", "name": "issues"}))
        }

        async fn query(
            State(state): State<RecreatedState>,
            Path(params): Path<HashMap<String, String>>,
        ) -> axum::response::Response {
            let id = params["collection"].clone();
            state.queried_ids.lock().unwrap().push(id.clone());
            if id != "col-2" {
                return (StatusCode::NOT_FOUND, "Collection does not exist").into_response();
            }
            Json(serde_json::json!({
                "ids": [["c1"]],
                "documents": [["OSPF adjacency stuck in EXSTART"]],
                "metadatas": [[{"device_name": "PDX-RO"}]],
                "distances": [[0.2]]
            }))
            .into_response()
        }

        let state = RecreatedState::default();
        let app = Router::new()
            .route(PREFIX, post(create))
            .route(&format!("{PREFIX}/{{collection}}"), get(lookup))
            .route(&format!("{PREFIX}/{{collection}}/query"), post(query))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), state)
    }

    #[tokio::test]
    async fn stale_cached_id_is_resolved_again() {
        let (url, state) = spawn_recreated().await;
        let chroma = index(&url);
        chroma.get_or_create_collection("issues").await.unwrap();

        for _ in 0..3 {
            let hits = chroma
                .similarity_search("issues", &[0.1, 0.2], 4)
                .await
                .unwrap();
            assert_eq!(hits[0].chunk.text, "OSPF adjacency stuck in EXSTART");
        }

        assert_eq!(*state.lookups.lock().unwrap(), 1);
        assert_eq!(
            *state.queried_ids.lock().unwrap(),
            vec!["col-1", "col-2", "col-2", "col-2"]
        );
    }

    #[tokio::test]
    async fn unknown_collection_is_not_queried() {
        let (url, state) = spawn_mock().await;
        let chroma = index(&url);

        let err = chroma
            .similarity_search("missing", &[0.1], 2)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::CollectionNotFound(_)));
        assert_eq!(*state.lookups.lock().unwrap(), 1);
        assert!(state.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let chroma = ChromaIndex::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = chroma.heartbeat().await.unwrap_err();
        assert!(matches!(err, IndexError::Unavailable(_)));
    }

    #[test]
    fn add_request_requires_embeddings() {
        assert!(AddRequest::from_chunks(vec![Chunk::new("x", "no vector")]).is_err());
    }

    #[test]
    fn tenant_override_changes_routes() {
        let chroma = index("http://localhost:8000/").with_tenant("lab", "netops");
        assert_eq!(
            chroma.collections_url(),
            "http://localhost:8000/api/v2/tenants/lab/databases/netops/collections"
        );
    }
}
