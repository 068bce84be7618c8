//! Common types for the vector indexing pipeline.
//!
//! These types are shared by the extractors, the index client, the store
//! backends and the retrieval facade, and are always available regardless
//! of feature flags.

use mirador_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Embedding dimension of the deployed collection.
pub const EMBEDDING_DIM: usize = 256;

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "multimodal_files";

// ============================================================================
// Configuration
// ============================================================================

/// Vector indexing configuration.
///
/// Controls store backend selection, the target collection, and the
/// per-call deadline and retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Store backend: "qdrant" or "memory".
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Base URL of the vector store.
    #[serde(default = "default_url")]
    pub url: String,

    /// API key sent to the store, if it requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Collection name.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Embedding dimension.
    #[serde(default = "default_dimension", deserialize_with = "number_or_string")]
    pub dimension: usize,

    /// Distance metric declared on collection creation.
    #[serde(default)]
    pub metric: DistanceMetric,

    /// Default number of results for queries.
    #[serde(default = "default_top_k", deserialize_with = "number_or_string")]
    pub default_top_k: usize,

    /// Deadline for a single decode or store round-trip, in milliseconds.
    #[serde(default = "default_timeout_ms", deserialize_with = "number_or_string")]
    pub timeout_ms: u64,

    /// Attempts for retryable store failures (1 disables retry).
    #[serde(default = "default_retry_attempts", deserialize_with = "number_or_string")]
    pub retry_attempts: usize,
}

/// Accept a number or its string form.
///
/// Environment overlays deliver every value as a string.
fn number_or_string<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString<N> {
        Number(N),
        String(String),
    }

    match NumberOrString::<T>::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn default_backend() -> String {
    "qdrant".to_string()
}

fn default_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_dimension() -> usize {
    EMBEDDING_DIM
}

fn default_top_k() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retry_attempts() -> usize {
    3
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_url(),
            api_key: None,
            collection: default_collection(),
            dimension: default_dimension(),
            metric: DistanceMetric::default(),
            default_top_k: default_top_k(),
            timeout_ms: default_timeout_ms(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl VectorConfig {
    /// The per-call deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The collection this configuration targets.
    pub fn collection_spec(&self) -> CollectionSpec {
        CollectionSpec {
            name: self.collection.clone(),
            dimension: self.dimension,
            metric: self.metric,
        }
    }
}

// ============================================================================
// Collection
// ============================================================================

/// Distance metric of a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity; scores in [-1, 1], higher is closer.
    #[default]
    Cosine,
    /// Raw dot product; higher is closer.
    Dot,
    /// Euclidean distance; stores report it so that higher is closer.
    Euclidean,
}

impl DistanceMetric {
    /// Name used by the Qdrant REST API.
    pub fn qdrant_name(&self) -> &'static str {
        match self {
            Self::Cosine => "Cosine",
            Self::Dot => "Dot",
            Self::Euclidean => "Euclid",
        }
    }
}

/// Name, dimension and metric of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Collection name.
    pub name: String,
    /// Embedding dimension.
    pub dimension: usize,
    /// Distance metric.
    pub metric: DistanceMetric,
}

impl CollectionSpec {
    /// Cosine collection with the deployed dimension.
    pub fn cosine(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension: EMBEDDING_DIM,
            metric: DistanceMetric::Cosine,
        }
    }

    /// Override the dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

/// What a store reports about a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Number of stored points.
    pub points_count: usize,
    /// Declared dimension, when the store reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

/// Health of the collection as seen by the index client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    /// The store answered.
    Ready,
    /// The store could not be queried.
    Error,
}

/// Collection statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Number of indexed items.
    pub total_items: usize,
    /// Dimension the client indexes with.
    pub dimension: usize,
    /// Whether the store answered.
    pub status: CollectionStatus,
    /// Failure description when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Embeddings
// ============================================================================

/// A fixed-length, immutable embedding vector.
///
/// Produced by [`EmbeddingComposer`](crate::compose::EmbeddingComposer);
/// there is no API for mutating components after construction. Serializes
/// as a plain array; it is never read back, so only
/// [`Embedding::try_from_vec`] admits outside values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub(crate) fn from_composed(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Wrap externally produced values, checking the expected length.
    pub fn try_from_vec(values: Vec<f32>, dimension: usize) -> Result<Self> {
        if values.len() != dimension {
            return Err(Error::dimension_mismatch(dimension, values.len()));
        }
        Ok(Self(values))
    }

    /// The components.
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the embedding has no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean norm, accumulated in `f64`.
    pub fn norm(&self) -> f64 {
        self.0
            .iter()
            .map(|&x| f64::from(x) * f64::from(x))
            .sum::<f64>()
            .sqrt()
    }

    /// True when every component is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&x| x == 0.0)
    }

    /// Consume into the raw components.
    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

// ============================================================================
// Items
// ============================================================================

/// Declared kind of an ingested file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Raster image; embedded from pixel data.
    Image,
    /// Text document; embedded from its display name.
    #[default]
    Text,
    /// Anything else; embedded from its display name.
    Other,
}

/// Extensions treated as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Extensions treated as text.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "json", "xml", "pdf"];

impl FileKind {
    /// Classify a file extension (with or without dot, any case).
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Image
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Self::Text
        } else {
            Self::Other
        }
    }

    /// Classify a path by its extension.
    pub fn from_path(path: &std::path::Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Other)
    }

    /// Lowercase name as stored in item metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "text" => Ok(Self::Text),
            "other" => Ok(Self::Other),
            other => Err(Error::validation(format!(
                "Unknown file kind: '{other}'. Expected image, text or other"
            ))),
        }
    }
}

/// Payload field names stored alongside each vector.
pub mod payload_fields {
    /// Caller-supplied content key.
    pub const CONTENT_KEY: &str = "content_key";
    /// Human-readable name.
    pub const DISPLAY_NAME: &str = "display_name";
    /// File kind ("image", "text", "other").
    pub const KIND: &str = "kind";
    /// Grouping folder.
    pub const GROUP: &str = "group";

    /// Field names written by the earlier Python service into the same
    /// collection. Read as fallbacks, never written.
    pub mod legacy {
        /// Content key.
        pub const FILE_HASH: &str = "file_hash";
        /// Display name.
        pub const FILENAME: &str = "filename";
        /// File kind.
        pub const FILE_TYPE: &str = "file_type";
        /// Grouping folder.
        pub const FOLDER: &str = "folder";
    }
}

/// Metadata stored with an indexed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    /// Caller-supplied content key; determines the item identifier.
    pub content_key: String,
    /// Human-readable name.
    pub display_name: String,
    /// Declared kind.
    pub kind: FileKind,
    /// Grouping folder; empty when ungrouped.
    #[serde(default)]
    pub group: String,
}

impl ItemMetadata {
    /// Create metadata with an empty group.
    pub fn new(
        content_key: impl Into<String>,
        display_name: impl Into<String>,
        kind: FileKind,
    ) -> Self {
        Self {
            content_key: content_key.into(),
            display_name: display_name.into(),
            kind,
            group: String::new(),
        }
    }

    /// Set the group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Flatten into a store payload.
    pub fn to_payload(&self) -> Payload {
        HashMap::from([
            (
                payload_fields::CONTENT_KEY.to_string(),
                serde_json::Value::from(self.content_key.as_str()),
            ),
            (
                payload_fields::DISPLAY_NAME.to_string(),
                serde_json::Value::from(self.display_name.as_str()),
            ),
            (
                payload_fields::KIND.to_string(),
                serde_json::Value::from(self.kind.as_str()),
            ),
            (
                payload_fields::GROUP.to_string(),
                serde_json::Value::from(self.group.as_str()),
            ),
        ])
    }
}

/// Arbitrary JSON payload attached to a stored vector.
pub type Payload = HashMap<String, serde_json::Value>;

/// An item ready for insertion into the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedItem {
    /// Store identifier derived from `metadata.content_key`.
    pub id: u32,
    /// The embedding.
    pub embedding: Embedding,
    /// Item metadata.
    pub metadata: ItemMetadata,
}

impl IndexedItem {
    /// Build an item, deriving its identifier from the content key.
    pub fn new(embedding: Embedding, metadata: ItemMetadata) -> Self {
        Self {
            id: mirador_core::item_id(&metadata.content_key),
            embedding,
            metadata,
        }
    }
}

/// A point as handed to a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StorePoint {
    /// Store identifier.
    pub id: u32,
    /// Vector components.
    pub vector: Vec<f32>,
    /// Payload.
    pub payload: Payload,
}

impl From<&IndexedItem> for StorePoint {
    fn from(item: &IndexedItem) -> Self {
        Self {
            id: item.id,
            vector: item.embedding.as_slice().to_vec(),
            payload: item.metadata.to_payload(),
        }
    }
}

/// A raw search hit returned by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreHit {
    /// Store identifier.
    pub id: u32,
    /// Similarity under the collection metric, higher is closer.
    pub score: f32,
    /// Stored payload.
    #[serde(default)]
    pub payload: Payload,
}

// ============================================================================
// Requests and responses
// ============================================================================

/// Request to ingest one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Content key; determines the item identifier.
    pub content_key: String,
    /// Location of the file content (read for images).
    pub source: PathBuf,
    /// Human-readable name (embedded for non-images).
    pub display_name: String,
    /// Declared kind.
    #[serde(default)]
    pub kind: FileKind,
    /// Grouping folder.
    #[serde(default)]
    pub group: String,
}

impl IngestRequest {
    /// Create a request with an empty group.
    pub fn new(
        content_key: impl Into<String>,
        source: impl Into<PathBuf>,
        display_name: impl Into<String>,
        kind: FileKind,
    ) -> Self {
        Self {
            content_key: content_key.into(),
            source: source.into(),
            display_name: display_name.into(),
            kind,
            group: String::new(),
        }
    }

    /// Set the group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Reject requests missing required fields.
    pub fn validate(&self) -> Result<()> {
        if self.content_key.trim().is_empty() {
            return Err(Error::validation("content_key is required"));
        }
        if self.source.as_os_str().is_empty() {
            return Err(Error::validation("source is required"));
        }
        if self.display_name.trim().is_empty() {
            return Err(Error::validation("display_name is required"));
        }
        Ok(())
    }

    /// The metadata this request will store.
    pub fn metadata(&self) -> ItemMetadata {
        ItemMetadata::new(&self.content_key, &self.display_name, self.kind)
            .with_group(&self.group)
    }
}

/// Where query image bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// Read from a file.
    Path(PathBuf),
    /// Already in memory.
    Bytes(Vec<u8>),
}

impl ImageSource {
    fn is_empty(&self) -> bool {
        match self {
            Self::Path(p) => p.as_os_str().is_empty(),
            Self::Bytes(b) => b.is_empty(),
        }
    }

    /// Short description for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

/// Query payload, tagged by mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum QueryInput {
    /// Text-origin query.
    Text {
        /// Query text.
        text: String,
    },
    /// Image-origin query.
    Image {
        /// Query image.
        image: ImageSource,
    },
}

/// A search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// What to search with.
    #[serde(flatten)]
    pub input: QueryInput,
    /// Maximum results.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl QueryRequest {
    /// Text query with the default `top_k`.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            input: QueryInput::Text { text: text.into() },
            top_k: default_top_k(),
        }
    }

    /// Image query with the default `top_k`.
    pub fn image(image: ImageSource) -> Self {
        Self {
            input: QueryInput::Image { image },
            top_k: default_top_k(),
        }
    }

    /// Set the result limit.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Reject requests with a missing payload or zero limit.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::validation("top_k must be at least 1"));
        }
        match &self.input {
            QueryInput::Text { text } if text.is_empty() => {
                Err(Error::validation("query text is required"))
            }
            QueryInput::Image { image } if image.is_empty() => {
                Err(Error::validation("query image is required"))
            }
            _ => Ok(()),
        }
    }
}

/// One ranked query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Content key of the matched item.
    pub content_key: String,
    /// Display name of the matched item.
    pub display_name: String,
    /// Kind of the matched item.
    pub kind: FileKind,
    /// Group of the matched item.
    pub group: String,
    /// Store score under the collection metric.
    pub raw_score: f32,
    /// `raw_score × 100`.
    pub similarity_percent: f32,
}

impl QueryResult {
    /// Map a store hit, defaulting missing fields to `""` and kind to text.
    ///
    /// Items written with the legacy field names (`file_hash`, `filename`,
    /// `file_type`, `folder`) map the same way.
    pub fn from_hit(hit: &StoreHit) -> Self {
        use payload_fields::legacy;

        let lookup = |name: &str, fallback: &str| {
            hit.payload
                .get(name)
                .and_then(|v| v.as_str())
                .or_else(|| hit.payload.get(fallback).and_then(|v| v.as_str()))
        };
        let field = |name: &str, fallback: &str| {
            lookup(name, fallback).unwrap_or_default().to_string()
        };
        let kind = lookup(payload_fields::KIND, legacy::FILE_TYPE)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            content_key: field(payload_fields::CONTENT_KEY, legacy::FILE_HASH),
            display_name: field(payload_fields::DISPLAY_NAME, legacy::FILENAME),
            kind,
            group: field(payload_fields::GROUP, legacy::FOLDER),
            raw_score: hit.score,
            similarity_percent: hit.score * 100.0,
        }
    }
}

/// Results of a search plus their count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Ranked results, best first.
    pub results: Vec<QueryResult>,
    /// Number of results.
    pub count: usize,
}

impl QueryResponse {
    /// Wrap ranked results.
    pub fn new(results: Vec<QueryResult>) -> Self {
        let count = results.len();
        Self { results, count }
    }
}

// ============================================================================
// Ingestion statistics
// ============================================================================

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// Store identifier written.
    pub id: u32,
    /// Content key ingested.
    pub content_key: String,
    /// Kind used to pick the extractor.
    pub kind: FileKind,
}

/// Statistics from a batch ingestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Items extracted and upserted.
    pub items_ingested: usize,

    /// Items that failed.
    pub items_failed: usize,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Per-item failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<IngestFailure>,
}

impl IngestStats {
    /// True when every item succeeded.
    pub fn is_clean(&self) -> bool {
        self.items_failed == 0
    }
}

/// A single failed item in a batch ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestFailure {
    /// Content key of the failed item.
    pub content_key: String,
    /// Error message.
    pub message: String,
}

// ============================================================================
// Tests
// ============================================================================
