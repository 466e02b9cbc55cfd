//! Qdrant vector store over the REST API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use lumen_core::{Error, Metadata, QueryHit, Result, VectorPoint, VectorStore};

/// Connection settings for Qdrant.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// REST endpoint, e.g. `http://127.0.0.1:6333`.
    pub url: String,
    /// Sent as the `api-key` header when set.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: lumen_core::defaults::QDRANT_URL.to_string(),
            api_key: None,
            timeout_seconds: 30,
        }
    }
}

impl QdrantConfig {
    /// Read `QDRANT_URL`, `QDRANT_API_KEY` and `QDRANT_TIMEOUT`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("QDRANT_URL").unwrap_or(defaults.url),
            api_key: std::env::var("QDRANT_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout_seconds: std::env::var("QDRANT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_seconds),
        }
    }
}

/// Qdrant-backed vector store using cosine distance.
pub struct QdrantStore {
    client: Client,
    config: QdrantConfig,
}

#[derive(Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    points: &'a [VectorPoint],
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<Metadata>,
}

impl QdrantStore {
    pub fn new(config: QdrantConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::VectorStore(format!("Failed to create HTTP client: {}", e)))?;

        info!("Initializing Qdrant store: url={}", config.url);
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &QdrantConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key {
            Some(ref key) => req.header("api-key", key),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        self.authorize(req)
            .send()
            .await
            .map_err(|e| Error::VectorStore(format!("Request failed: {}", e)))
    }

    async fn error_body(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        format!("Qdrant returned {}: {}", status, body)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let response = self
            .send(self.client.get(self.url(&format!("/collections/{}", collection))))
            .await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Error::VectorStore(Self::error_body(response).await)),
        }
    }

    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let request = CreateCollectionRequest {
            vectors: VectorParams {
                size: dimension,
                distance: "Cosine",
            },
        };
        let response = self
            .send(
                self.client
                    .put(self.url(&format!("/collections/{}", collection)))
                    .json(&request),
            )
            .await?;

        if response.status().is_success() {
            debug!(collection, dimension, "Created collection");
            return Ok(());
        }
        let message = Self::error_body(response).await;
        if message.contains("already exists") {
            Err(Error::CollectionExists(collection.to_string()))
        } else {
            Err(Error::VectorStore(message))
        }
    }

    #[instrument(skip(self, points), fields(subsystem = "vector", component = "qdrant", op = "upsert", input_count = points.len()))]
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        let start = Instant::now();
        let response = self
            .send(
                self.client
                    .put(self.url(&format!("/collections/{}/points?wait=true", collection)))
                    .json(&UpsertRequest { points: &points }),
            )
            .await?;

        match response.status() {
            s if s.is_success() => {
                debug!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Upsert complete"
                );
                Ok(points.len())
            }
            StatusCode::NOT_FOUND => Err(Error::CollectionNotFound(collection.to_string())),
            _ => Err(Error::VectorStore(Self::error_body(response).await)),
        }
    }

    #[instrument(skip(self, vector), fields(subsystem = "vector", component = "qdrant", op = "query"))]
    async fn query(&self, collection: &str, vector: &[f32], limit: usize) -> Result<Vec<QueryHit>> {
        let response = self
            .send(
                self.client
                    .post(self.url(&format!("/collections/{}/points/search", collection)))
                    .json(&SearchRequest {
                        vector,
                        limit,
                        with_payload: true,
                    }),
            )
            .await?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(Error::CollectionNotFound(collection.to_string()))
            }
            _ => return Err(Error::VectorStore(Self::error_body(response).await)),
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to parse response: {}", e)))?;

        let mut hits: Vec<QueryHit> = parsed
            .result
            .into_iter()
            .map(|p| QueryHit {
                score: p.score,
                metadata: p.payload.unwrap_or_default(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(result_count = hits.len(), "Query complete");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
