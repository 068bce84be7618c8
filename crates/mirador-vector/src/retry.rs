//! Retry wrapper for vector stores.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use mirador_core::{Error, Result};

use crate::store::VectorStore;
use crate::types::{CollectionInfo, CollectionSpec, StoreHit, StorePoint};

/// Wraps a vector store with retry logic for transient failures.
///
/// Only errors for which [`Error::is_retryable`] holds are retried;
/// dimension mismatches and rejected requests fail immediately.
pub struct RetryingStore {
    inner: Arc<dyn VectorStore>,
    max_attempts: usize,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryingStore {
    /// Creates a new retry wrapper with default settings.
    ///
    /// Default settings:
    /// - Max attempts: 3
    /// - Initial delay: 200 milliseconds
    /// - Max delay: 5 seconds
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            inner: store,
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }

    /// Sets the maximum number of attempts, including the first.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the initial delay between retries.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay between retries.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts - 1)
    }

    fn should_retry(error: &Error) -> bool {
        let retry = error.is_retryable();
        if retry {
            log::debug!("Retrying vector store call after: {error}");
        }
        retry
    }
}

#[async_trait]
impl VectorStore for RetryingStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        (|| async { self.inner.collection_exists(collection).await })
            .retry(self.backoff())
            .when(Self::should_retry)
            .await
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<()> {
        (|| async { self.inner.create_collection(spec).await })
            .retry(self.backoff())
            .when(Self::should_retry)
            .await
    }

    async fn upsert(&self, collection: &str, point: StorePoint) -> Result<()> {
        (|| async { self.inner.upsert(collection, point.clone()).await })
            .retry(self.backoff())
            .when(Self::should_retry)
            .await
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<StoreHit>> {
        (|| async { self.inner.search(collection, vector, limit).await })
            .retry(self.backoff())
            .when(Self::should_retry)
            .await
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
        (|| async { self.inner.collection_info(collection).await })
            .retry(self.backoff())
            .when(Self::should_retry)
            .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
