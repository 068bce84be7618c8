//! Qdrant vector store backend.
//!
//! Talks to a Qdrant server over its REST API:
//!
//! | Operation           | Request                                   |
//! |---------------------|-------------------------------------------|
//! | `collection_exists` | `GET /collections/{c}` (404 → false)      |
//! | `create_collection` | `PUT /collections/{c}`                    |
//! | `upsert`            | `PUT /collections/{c}/points?wait=true`   |
//! | `search`            | `POST /collections/{c}/points/search`     |
//! | `collection_info`   | `GET /collections/{c}`                    |
//!
//! Connection failures and 5xx answers map to `Error::IndexUnavailable`
//! (retryable); other non-success answers map to `Error::Index`.
//!
//! # Feature Gate
//!
//! This module requires the `store-qdrant` feature.

use async_trait::async_trait;
use mirador_core::{Error, Result};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::store::VectorStore;
use crate::types::{
    CollectionInfo, CollectionSpec, DistanceMetric, Payload, StoreHit, StorePoint, VectorConfig,
};

/// Vector store backed by a Qdrant server.
pub struct QdrantStore {
    base_url: String,
    api_key: Option<String>,
    metric: DistanceMetric,
    client: reqwest::Client,
}

impl QdrantStore {
    /// Creates a store for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            metric: DistanceMetric::Cosine,
            client: reqwest::Client::new(),
        }
    }

    /// Creates a store from configuration (URL, API key, metric, timeout).
    pub fn from_config(config: &VectorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            metric: config.metric,
            client,
        })
    }

    /// Sends the `api-key` header with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the metric used to interpret search scores.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.base_url, collection)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder, what: &str) -> Result<Response> {
        builder
            .send()
            .await
            .map_err(|e| Error::index_unavailable(format!("Failed to {what}"), e))
    }

    async fn fetch_collection(&self, collection: &str) -> Result<Option<CollectionResult>> {
        let response = self
            .send(
                self.request(reqwest::Method::GET, self.collection_url(collection)),
                "get collection",
            )
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: ApiResponse<CollectionResult> =
            parse(check(response, "get collection").await?).await?;
        Ok(Some(body.result))
    }
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("base_url", &self.base_url)
            .field("metric", &self.metric)
            .finish()
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.fetch_collection(collection).await?.is_some())
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let body = CreateCollectionBody {
            vectors: VectorParams {
                size: spec.dimension,
                distance: spec.metric.qdrant_name().to_string(),
            },
        };
        let response = self
            .send(
                self.request(reqwest::Method::PUT, self.collection_url(&spec.name))
                    .json(&body),
                "create collection",
            )
            .await?;
        check(response, "create collection").await?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: StorePoint) -> Result<()> {
        let body = UpsertBody {
            points: vec![PointBody {
                id: point.id,
                vector: point.vector,
                payload: point.payload,
            }],
        };
        let url = format!("{}/points?wait=true", self.collection_url(collection));
        let response = self
            .send(
                self.request(reqwest::Method::PUT, url).json(&body),
                "upsert point",
            )
            .await?;
        check_in(response, collection, "upsert point").await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<StoreHit>> {
        let body = SearchBody {
            vector,
            limit,
            with_payload: true,
        };
        let url = format!("{}/points/search", self.collection_url(collection));
        let response = self
            .send(
                self.request(reqwest::Method::POST, url).json(&body),
                "search",
            )
            .await?;
        let body: ApiResponse<Vec<ScoredPoint>> =
            parse(check_in(response, collection, "search").await?).await?;

        body.result
            .into_iter()
            .map(|p| p.into_hit(self.metric))
            .collect()
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
        let result = self
            .fetch_collection(collection)
            .await?
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        Ok(CollectionInfo {
            points_count: result.points_count.unwrap_or(0),
            dimension: result.config.and_then(|c| c.params.vectors.size()),
        })
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

// ============================================================================
// Response handling
// ============================================================================

/// Map a non-success status to an error.
async fn check(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    if status.is_server_error() {
        Err(Error::index_unavailable_msg(format!(
            "Qdrant {what} failed with {status}: {error_text}"
        )))
    } else {
        Err(Error::index(format!(
            "Qdrant {what} failed with {status}: {error_text}"
        )))
    }
}

/// Like [`check`], but a 404 means the collection is missing.
async fn check_in(response: Response, collection: &str, what: &str) -> Result<Response> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(Error::CollectionNotFound(collection.to_string()));
    }
    check(response, what).await
}

async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| Error::Serialization(format!("Failed to parse Qdrant response: {e}")))
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateCollectionBody {
    vectors: VectorParams,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorParams {
    size: usize,
    distance: String,
}

#[derive(Debug, Serialize)]
struct UpsertBody {
    points: Vec<PointBody>,
}

#[derive(Debug, Serialize)]
struct PointBody {
    id: u32,
    vector: Vec<f32>,
    payload: Payload,
}

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionResult {
    #[serde(default)]
    points_count: Option<usize>,
    #[serde(default)]
    config: Option<CollectionConfig>,
}

#[derive(Debug, Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Debug, Deserialize)]
struct CollectionParams {
    vectors: VectorsConfig,
}

/// Single unnamed vector, or a map of named vectors.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VectorsConfig {
    Single(VectorParams),
    Named(std::collections::HashMap<String, VectorParams>),
}

impl VectorsConfig {
    fn size(&self) -> Option<usize> {
        match self {
            Self::Single(params) => Some(params.size),
            Self::Named(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
}

impl ScoredPoint {
    fn into_hit(self, metric: DistanceMetric) -> Result<StoreHit> {
        let id = self
            .id
            .as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .ok_or_else(|| Error::index(format!("Unexpected point id from Qdrant: {}", self.id)))?;

        // Qdrant reports Euclidean distance, where lower is closer.
        let score = match metric {
            DistanceMetric::Euclidean => -self.score,
            _ => self.score,
        };

        Ok(StoreHit {
            id,
            score,
            payload: self.payload.unwrap_or_default(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
