//! Vector store trait and in-memory implementation.
//!
//! The `VectorStore` trait is the boundary between the index client and a
//! concrete vector database. Stores know nothing about extraction or
//! metadata layout; they hold `(id, vector, payload)` points in named
//! collections and answer nearest-neighbour searches.
//!
//! # Backends
//!
//! - `InMemoryVectorStore`: exhaustive scoring, always available
//! - `QdrantStore`: Qdrant REST API (requires `store-qdrant` feature)
//! - `RetryingStore`: retries transient failures of another store

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use mirador_core::{Error, Result};
use tokio::sync::RwLock;

use crate::retry::RetryingStore;
use crate::types::{
    CollectionInfo, CollectionSpec, DistanceMetric, Payload, StoreHit, StorePoint, VectorConfig,
};

/// Trait for vector store backends.
///
/// Implementations must be `Send + Sync` so a single store can be shared
/// across async tasks behind an `Arc`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether the named collection exists.
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Create a collection. Fails if it already exists.
    async fn create_collection(&self, spec: &CollectionSpec) -> Result<()>;

    /// Insert or replace the point with `point.id`.
    async fn upsert(&self, collection: &str, point: StorePoint) -> Result<()>;

    /// Up to `limit` nearest points, best first.
    async fn search(&self, collection: &str, vector: &[f32], limit: usize)
    -> Result<Vec<StoreHit>>;

    /// Point count and declared dimension.
    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo>;

    /// The backend name for diagnostics.
    fn name(&self) -> &str;
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug)]
struct MemoryCollection {
    spec: CollectionSpec,
    points: BTreeMap<u32, (Vec<f32>, Payload)>,
}

/// Exhaustive-scan vector store held in process memory.
///
/// Scores every point under the collection metric. Suitable for tests and
/// small offline collections.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Score `b` against `a`; higher is closer for every metric.
pub fn similarity(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();

    match metric {
        DistanceMetric::Dot => dot as f32,
        DistanceMetric::Cosine => {
            let na = a.iter().map(|&x| f64::from(x).powi(2)).sum::<f64>().sqrt();
            let nb = b.iter().map(|&x| f64::from(x).powi(2)).sum::<f64>().sqrt();
            if na == 0.0 || nb == 0.0 {
                0.0
            } else {
                (dot / (na * nb)) as f32
            }
        }
        DistanceMetric::Euclidean => {
            let dist = a
                .iter()
                .zip(b)
                .map(|(&x, &y)| (f64::from(x) - f64::from(y)).powi(2))
                .sum::<f64>()
                .sqrt();
            -dist as f32
        }
    }
}

/// Order hits by descending score, then ascending id.
///
/// NaN scores rank last.
pub fn rank_hits(hits: &mut [StoreHit]) {
    fn key(score: f32) -> f32 {
        if score.is_nan() { f32::NEG_INFINITY } else { score }
    }

    hits.sort_by(|a, b| {
        key(b.score)
            .total_cmp(&key(a.score))
            .then(a.id.cmp(&b.id))
    });
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(&spec.name) {
            return Err(Error::index(format!(
                "Collection '{}' already exists",
                spec.name
            )));
        }
        collections.insert(
            spec.name.clone(),
            MemoryCollection {
                spec: spec.clone(),
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: StorePoint) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        if point.vector.len() != target.spec.dimension {
            return Err(Error::dimension_mismatch(
                target.spec.dimension,
                point.vector.len(),
            ));
        }
        target.points.insert(point.id, (point.vector, point.payload));
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<StoreHit>> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        if vector.len() != target.spec.dimension {
            return Err(Error::dimension_mismatch(
                target.spec.dimension,
                vector.len(),
            ));
        }

        let mut hits: Vec<StoreHit> = target
            .points
            .iter()
            .map(|(&id, (stored, payload))| StoreHit {
                id,
                score: similarity(target.spec.metric, vector, stored),
                payload: payload.clone(),
            })
            .collect();

        rank_hits(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        Ok(CollectionInfo {
            points_count: target.points.len(),
            dimension: Some(target.spec.dimension),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Create a vector store from configuration.
///
/// `backend` selects `"memory"` or `"qdrant"`. When `retry_attempts` is
/// greater than one the store is wrapped in a [`RetryingStore`].
pub fn create_vector_store(config: &VectorConfig) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.backend.as_str() {
        "memory" => Arc::new(InMemoryVectorStore::new()),
        "qdrant" => qdrant_store(config)?,
        other => {
            return Err(Error::config(format!(
                "Unknown vector store backend: '{other}'. Expected memory or qdrant"
            )));
        }
    };

    if config.retry_attempts > 1 {
        Ok(Arc::new(
            RetryingStore::new(store).with_max_attempts(config.retry_attempts),
        ))
    } else {
        Ok(store)
    }
}

#[cfg(feature = "store-qdrant")]
fn qdrant_store(config: &VectorConfig) -> Result<Arc<dyn VectorStore>> {
    Ok(Arc::new(crate::qdrant::QdrantStore::from_config(config)?))
}

#[cfg(not(feature = "store-qdrant"))]
fn qdrant_store(_config: &VectorConfig) -> Result<Arc<dyn VectorStore>> {
    Err(Error::config(
        "The qdrant backend requires the `store-qdrant` feature",
    ))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: u32, vector: Vec<f32>) -> StorePoint {
        StorePoint {
            id,
            vector,
            payload: Payload::new(),
        }
    }

    async fn store_with(spec: CollectionSpec) -> InMemoryVectorStore {
        let store = InMemoryVectorStore::new();
        store.create_collection(&spec).await.unwrap();
        store
    }

    // ------------------------------------------------------------------------
    // Scoring tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_similarity_cosine() {
        let s = similarity(DistanceMetric::Cosine, &[1.0, 0.0], &[2.0, 0.0]);
        assert!((s - 1.0).abs() < 1e-6);
        let s = similarity(DistanceMetric::Cosine, &[1.0, 0.0], &[0.0, 1.0]);
        assert!(s.abs() < 1e-6);
        assert_eq!(similarity(DistanceMetric::Cosine, &[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_similarity_dot_and_euclidean() {
        assert_eq!(similarity(DistanceMetric::Dot, &[1.0, 2.0], &[3.0, 4.0]), 11.0);
        assert_eq!(
            similarity(DistanceMetric::Euclidean, &[0.0, 0.0], &[3.0, 4.0]),
            -5.0
        );
    }

    #[test]
    fn test_rank_hits_ties_by_id() {
        let hit = |id, score| StoreHit {
            id,
            score,
            payload: Payload::new(),
        };
        let mut hits = vec![hit(9, 0.5), hit(3, 0.9), hit(1, 0.5)];
        rank_hits(&mut hits);

        let ids: Vec<u32> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![3, 1, 9]);
    }

    #[test]
    fn test_rank_hits_nan_scores_last() {
        let hit = |id, score| StoreHit {
            id,
            score,
            payload: Payload::new(),
        };
        let mut hits = vec![
            hit(4, f32::NAN),
            hit(2, 0.1),
            hit(8, f32::NAN),
            hit(5, 0.7),
            hit(6, f32::NEG_INFINITY),
        ];
        rank_hits(&mut hits);

        let ids: Vec<u32> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![5, 2, 4, 6, 8]);
    }

    // ------------------------------------------------------------------------
    // Collection tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_collection_once() {
        let store = InMemoryVectorStore::new();
        let spec = CollectionSpec::cosine("files").with_dimension(2);

        assert!(!store.collection_exists("files").await.unwrap());
        tokio_test::assert_ok!(store.create_collection(&spec).await);
        assert!(store.collection_exists("files").await.unwrap());
        assert!(store.create_collection(&spec).await.unwrap_err().is_index());
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let store = InMemoryVectorStore::new();

        let err = store.upsert("nope", point(1, vec![1.0])).await.unwrap_err();
        assert!(matches!(err, Error::CollectionNotFound(_)));
        assert!(store.search("nope", &[1.0], 5).await.is_err());
        assert!(store.collection_info("nope").await.is_err());
    }

    // ------------------------------------------------------------------------
    // Upsert and search tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_upsert_replaces_point() {
        let store = store_with(CollectionSpec::cosine("c").with_dimension(2)).await;
        store.upsert("c", point(1, vec![1.0, 0.0])).await.unwrap();
        store.upsert("c", point(1, vec![0.0, 1.0])).await.unwrap();

        let info = store.collection_info("c").await.unwrap();
        assert_eq!(info.points_count, 1);
        assert_eq!(info.dimension, Some(2));

        let hits = store.search("c", &[0.0, 1.0], 5).await.unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_upsert_dimension_mismatch() {
        let store = store_with(CollectionSpec::cosine("c").with_dimension(3)).await;
        let err = store.upsert("c", point(1, vec![1.0])).await.unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_search_ranks_and_limits() {
        let store = store_with(CollectionSpec::cosine("c").with_dimension(2)).await;
        store.upsert("c", point(1, vec![1.0, 0.0])).await.unwrap();
        store.upsert("c", point(2, vec![0.7, 0.7])).await.unwrap();
        store.upsert("c", point(3, vec![0.0, 1.0])).await.unwrap();

        let hits = store.search("c", &[1.0, 0.1], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 1);
        assert_eq!(hits[1].id, 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_search_dimension_mismatch() {
        let store = store_with(CollectionSpec::cosine("c").with_dimension(2)).await;
        let err = store.search("c", &[1.0, 0.0, 0.0], 2).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_search_returns_payload() {
        let store = store_with(CollectionSpec::cosine("c").with_dimension(1)).await;
        let mut payload = Payload::new();
        payload.insert("display_name".into(), serde_json::json!("cat.png"));
        store
            .upsert(
                "c",
                StorePoint {
                    id: 4,
                    vector: vec![1.0],
                    payload,
                },
            )
            .await
            .unwrap();

        let hits = store.search("c", &[1.0], 1).await.unwrap();
        assert_eq!(hits[0].payload["display_name"], "cat.png");
    }

    // ------------------------------------------------------------------------
    // Factory tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_create_vector_store_memory() {
        let config = VectorConfig {
            backend: "memory".into(),
            retry_attempts: 1,
            ..Default::default()
        };
        let store = create_vector_store(&config).unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_create_vector_store_wraps_retry() {
        let config = VectorConfig {
            backend: "memory".into(),
            retry_attempts: 3,
            ..Default::default()
        };
        let store = create_vector_store(&config).unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_create_vector_store_unknown_backend() {
        let config = VectorConfig {
            backend: "faiss".into(),
            ..Default::default()
        };
        let err = create_vector_store(&config).err().unwrap();
        assert_eq!(err.kind(), mirador_core::ErrorKind::Config);
    }

    #[cfg(not(feature = "store-qdrant"))]
    #[test]
    fn test_create_vector_store_qdrant_requires_feature() {
        let err = create_vector_store(&VectorConfig::default()).err().unwrap();
        assert!(err.to_string().contains("store-qdrant"));
    }

    #[test]
    fn test_trait_object_safety() {
        fn _assert_object_safe(_: &dyn VectorStore) {}
    }
}
