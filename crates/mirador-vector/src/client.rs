//! Index client: the collection-level API over a [`VectorStore`].
//!
//! The client owns the collection spec (name, dimension, metric), checks
//! embedding lengths before anything reaches the store, bounds every store
//! round-trip by a deadline, and normalizes the ordering of search hits.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mirador_core::{Error, Result};

use crate::store::{rank_hits, VectorStore};
use crate::types::{
    CollectionSpec, CollectionStats, CollectionStatus, Embedding, IndexedItem, StoreHit,
    StorePoint, VectorConfig,
};

/// Collection-level operations against a vector store.
pub struct IndexClient {
    store: Arc<dyn VectorStore>,
    spec: CollectionSpec,
    timeout: Duration,
}

impl IndexClient {
    /// Create a client for `spec` with a 30 second deadline.
    pub fn new(store: Arc<dyn VectorStore>, spec: CollectionSpec) -> Self {
        Self {
            store,
            spec,
            timeout: Duration::from_secs(30),
        }
    }

    /// Create a client from configuration.
    pub fn from_config(store: Arc<dyn VectorStore>, config: &VectorConfig) -> Self {
        Self::new(store, config.collection_spec()).with_timeout(config.timeout())
    }

    /// Set the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The collection this client targets.
    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    /// The store backend name.
    pub fn backend_name(&self) -> &str {
        self.store.name()
    }

    async fn bounded<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::index_timeout(operation, self.timeout))?
    }

    /// Create the collection if it does not exist.
    ///
    /// An existing collection is left as-is, even if its declared dimension
    /// differs from this client's.
    pub async fn ensure_collection(&self) -> Result<()> {
        let name = &self.spec.name;
        if self
            .bounded("collection lookup", self.store.collection_exists(name))
            .await?
        {
            if let Ok(info) = self
                .bounded("collection info", self.store.collection_info(name))
                .await
                && let Some(dimension) = info.dimension
                && dimension != self.spec.dimension
            {
                log::warn!(
                    "Collection '{name}' has dimension {dimension}, client expects {}",
                    self.spec.dimension
                );
            }
            log::debug!("Collection '{name}' already exists");
            return Ok(());
        }

        if let Err(e) = self
            .bounded("create collection", self.store.create_collection(&self.spec))
            .await
        {
            // Another caller may have created it between lookup and create.
            if self
                .bounded("collection lookup", self.store.collection_exists(name))
                .await
                .unwrap_or(false)
            {
                log::debug!("Collection '{name}' created concurrently");
                return Ok(());
            }
            return Err(e);
        }
        log::info!(
            "Created collection '{name}' (dimension {}, {:?})",
            self.spec.dimension,
            self.spec.metric
        );
        Ok(())
    }

    /// Insert or replace `item`.
    pub async fn upsert(&self, item: &IndexedItem) -> Result<()> {
        if item.embedding.len() != self.spec.dimension {
            return Err(Error::dimension_mismatch(
                self.spec.dimension,
                item.embedding.len(),
            ));
        }

        self.bounded(
            "upsert",
            self.store.upsert(&self.spec.name, StorePoint::from(item)),
        )
        .await?;
        log::debug!(
            "Upserted '{}' as id {}",
            item.metadata.content_key,
            item.id
        );
        Ok(())
    }

    /// At most `top_k` hits, best first, ties by ascending id.
    pub async fn query(&self, embedding: &Embedding, top_k: usize) -> Result<Vec<StoreHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        if embedding.len() != self.spec.dimension {
            return Err(Error::dimension_mismatch(
                self.spec.dimension,
                embedding.len(),
            ));
        }

        let mut hits = self
            .bounded(
                "search",
                self.store
                    .search(&self.spec.name, embedding.as_slice(), top_k),
            )
            .await?;
        rank_hits(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Item count and health; store failures are reported in the result.
    pub async fn get_stats(&self) -> CollectionStats {
        match self
            .bounded("collection info", self.store.collection_info(&self.spec.name))
            .await
        {
            Ok(info) => CollectionStats {
                total_items: info.points_count,
                dimension: self.spec.dimension,
                status: CollectionStatus::Ready,
                error: None,
            },
            Err(e) => {
                log::warn!("Failed to read stats for '{}': {e}", self.spec.name);
                CollectionStats {
                    total_items: 0,
                    dimension: self.spec.dimension,
                    status: CollectionStatus::Error,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

impl std::fmt::Debug for IndexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexClient")
            .field("store", &self.store.name())
            .field("spec", &self.spec)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::EmbeddingComposer;
    use crate::store::InMemoryVectorStore;
    use crate::types::{
        CollectionInfo, DistanceMetric, FileKind, ItemMetadata, EMBEDDING_DIM,
    };
    use async_trait::async_trait;

    fn embedding(raw: &[f64]) -> Embedding {
        EmbeddingComposer::default().compose(raw)
    }

    fn item(key: &str, raw: &[f64]) -> IndexedItem {
        IndexedItem::new(
            embedding(raw),
            ItemMetadata::new(key, format!("{key}.txt"), FileKind::Text),
        )
    }

    async fn ready_client() -> IndexClient {
        let client = IndexClient::new(
            Arc::new(InMemoryVectorStore::new()),
            CollectionSpec::cosine("files"),
        );
        client.ensure_collection().await.unwrap();
        client
    }

    /// Store whose every call sleeps past any short deadline.
    struct StalledStore;

    #[async_trait]
    impl VectorStore for StalledStore {
        async fn collection_exists(&self, _collection: &str) -> Result<bool> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(true)
        }

        async fn create_collection(&self, _spec: &CollectionSpec) -> Result<()> {
            Ok(())
        }

        async fn upsert(&self, _collection: &str, _point: StorePoint) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn search(
            &self,
            _collection: &str,
            _vector: &[f32],
            _limit: usize,
        ) -> Result<Vec<StoreHit>> {
            Ok(Vec::new())
        }

        async fn collection_info(&self, _collection: &str) -> Result<CollectionInfo> {
            Err(Error::index_unavailable_msg("connection refused"))
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    /// In-memory store whose lookups lag, widening the lookup/create window.
    struct SlowLookupStore(InMemoryVectorStore);

    #[async_trait]
    impl VectorStore for SlowLookupStore {
        async fn collection_exists(&self, collection: &str) -> Result<bool> {
            let exists = self.0.collection_exists(collection).await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            exists
        }

        async fn create_collection(&self, spec: &CollectionSpec) -> Result<()> {
            self.0.create_collection(spec).await
        }

        async fn upsert(&self, collection: &str, point: StorePoint) -> Result<()> {
            self.0.upsert(collection, point).await
        }

        async fn search(
            &self,
            collection: &str,
            vector: &[f32],
            limit: usize,
        ) -> Result<Vec<StoreHit>> {
            self.0.search(collection, vector, limit).await
        }

        async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
            self.0.collection_info(collection).await
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    // ------------------------------------------------------------------------
    // ensure_collection tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_ensure_collection_concurrent_callers() {
        let store: Arc<dyn VectorStore> = Arc::new(SlowLookupStore(InMemoryVectorStore::new()));
        let a = IndexClient::new(store.clone(), CollectionSpec::cosine("files"));
        let b = IndexClient::new(store.clone(), CollectionSpec::cosine("files"));

        let (ra, rb) = tokio::join!(a.ensure_collection(), b.ensure_collection());
        assert!(ra.is_ok(), "{ra:?}");
        assert!(rb.is_ok(), "{rb:?}");
        assert!(store.collection_exists("files").await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_collection_idempotent() {
        let store = Arc::new(InMemoryVectorStore::new());
        let client = IndexClient::new(store.clone(), CollectionSpec::cosine("files"));

        client.ensure_collection().await.unwrap();
        client.ensure_collection().await.unwrap();
        assert!(store.collection_exists("files").await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_collection_leaves_mismatched_existing() {
        let store = Arc::new(InMemoryVectorStore::new());
        store
            .create_collection(&CollectionSpec::cosine("files").with_dimension(8))
            .await
            .unwrap();

        let client = IndexClient::new(store.clone(), CollectionSpec::cosine("files"));
        client.ensure_collection().await.unwrap();

        let info = store.collection_info("files").await.unwrap();
        assert_eq!(info.dimension, Some(8));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = VectorConfig {
            collection: "photos".into(),
            metric: DistanceMetric::Dot,
            timeout_ms: 500,
            ..Default::default()
        };
        let client = IndexClient::from_config(Arc::new(InMemoryVectorStore::new()), &config);
        assert_eq!(client.spec().name, "photos");
        assert_eq!(client.spec().metric, DistanceMetric::Dot);
        assert_eq!(client.timeout, Duration::from_millis(500));
        assert_eq!(client.backend_name(), "memory");
    }

    // ------------------------------------------------------------------------
    // upsert tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_upsert_overwrites_same_key() {
        let client = ready_client().await;
        client.upsert(&item("k", &[1.0, 0.0])).await.unwrap();
        client.upsert(&item("k", &[0.0, 1.0])).await.unwrap();

        assert_eq!(client.get_stats().await.total_items, 1);
        let hits = client.query(&embedding(&[0.0, 1.0]), 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_upsert_dimension_mismatch_before_store() {
        // The stalled store would time out if it were contacted.
        let client = IndexClient::new(Arc::new(StalledStore), CollectionSpec::cosine("files"))
            .with_timeout(Duration::from_millis(20));
        let short = IndexedItem::new(
            Embedding::try_from_vec(vec![1.0; 3], 3).unwrap(),
            ItemMetadata::new("k", "k", FileKind::Text),
        );

        let err = client.upsert(&short).await.unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: 3
            }
        ));
    }

    // ------------------------------------------------------------------------
    // query tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_query_top_k_and_order() {
        let client = ready_client().await;
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            client
                .upsert(&item(key, &[1.0, i as f64]))
                .await
                .unwrap();
        }

        let hits = client.query(&embedding(&[1.0, 0.0]), 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[0].id, mirador_core::item_id("a"));
    }

    #[tokio::test]
    async fn test_query_zero_top_k() {
        let client = ready_client().await;
        client.upsert(&item("a", &[1.0])).await.unwrap();
        assert!(client.query(&embedding(&[1.0]), 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_empty_collection() {
        let client = ready_client().await;
        assert!(client.query(&embedding(&[1.0]), 5).await.unwrap().is_empty());
    }

    // ------------------------------------------------------------------------
    // Timeout and stats tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_store_call_times_out() {
        let client = IndexClient::new(Arc::new(StalledStore), CollectionSpec::cosine("files"))
            .with_timeout(Duration::from_millis(20));

        let err = client.ensure_collection().await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.is_index());

        let err = client.upsert(&item("k", &[1.0])).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_get_stats_ready() {
        let client = ready_client().await;
        client.upsert(&item("a", &[1.0])).await.unwrap();
        client.upsert(&item("b", &[0.5, 0.5])).await.unwrap();

        let stats = client.get_stats().await;
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.dimension, 256);
        assert_eq!(stats.status, CollectionStatus::Ready);
        assert!(stats.error.is_none());
    }

    #[tokio::test]
    async fn test_get_stats_reports_error() {
        let client = IndexClient::new(Arc::new(StalledStore), CollectionSpec::cosine("files"));
        let stats = client.get_stats().await;

        assert_eq!(stats.status, CollectionStatus::Error);
        assert_eq!(stats.total_items, 0);
        assert!(stats.error.unwrap().contains("connection refused"));
    }
}
