//! Retrieval facade.
//!
//! `Retriever` ties the extractors to the index client: it validates
//! requests, picks the extractor for each file kind, writes items, and
//! maps store hits back to [`QueryResult`]s. Images are embedded from their
//! pixels; text and other files are embedded from their display name.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use mirador_core::Result;
use mirador_core::util::files::{FindOptions, find_all_files};

use crate::client::IndexClient;
use crate::compose::EmbeddingComposer;
use crate::image_features::ImageExtractor;
use crate::store::create_vector_store;
use crate::text_features::TextExtractor;
use crate::types::{
    CollectionStats, Embedding, FileKind, IMAGE_EXTENSIONS, ImageSource, IndexedItem,
    IngestFailure, IngestOutcome, IngestRequest, IngestStats, QueryInput, QueryRequest,
    QueryResponse, QueryResult, TEXT_EXTENSIONS, VectorConfig,
};

/// Default number of items ingested concurrently by batch operations.
const DEFAULT_CONCURRENCY: usize = 4;

/// Ingestion and search over one collection.
///
/// Construct once and share behind an `Arc`.
pub struct Retriever {
    client: Arc<IndexClient>,
    text: TextExtractor,
    image: ImageExtractor,
    default_top_k: usize,
    concurrency: usize,
}

impl Retriever {
    /// Create a retriever over `client`, sizing extractors from `config`.
    pub fn new(client: Arc<IndexClient>, config: &VectorConfig) -> Self {
        let composer = EmbeddingComposer::new(config.dimension);
        Self {
            client,
            text: TextExtractor::new(composer),
            image: ImageExtractor::new(composer).with_timeout(config.timeout()),
            default_top_k: config.default_top_k,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Build the store and client from `config` and ensure the collection.
    pub async fn connect(config: &VectorConfig) -> Result<Self> {
        let store = create_vector_store(config)?;
        let client = IndexClient::from_config(store, config);
        client.ensure_collection().await?;
        Ok(Self::new(Arc::new(client), config))
    }

    /// Set how many items batch operations ingest at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The underlying index client.
    pub fn client(&self) -> &IndexClient {
        &self.client
    }

    /// Configured default result count.
    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Embed and store one file.
    ///
    /// Nothing is written if validation or extraction fails.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<IngestOutcome> {
        request.validate()?;

        let embedding = self.embed_file(request).await?;
        let item = IndexedItem::new(embedding, request.metadata());
        self.client.upsert(&item).await?;

        Ok(IngestOutcome {
            id: item.id,
            content_key: request.content_key.clone(),
            kind: request.kind,
        })
    }

    async fn embed_file(&self, request: &IngestRequest) -> Result<Embedding> {
        match request.kind {
            FileKind::Image => self.image.extract_path(&request.source).await,
            FileKind::Text | FileKind::Other => Ok(self.text.extract(&request.display_name)),
        }
    }

    /// Ingest every request independently; failures never stop the batch.
    pub async fn ingest_batch(&self, requests: &[IngestRequest]) -> IngestStats {
        let start = Instant::now();
        let mut stats = IngestStats::default();

        let outcomes: Vec<_> = stream::iter(requests)
            .map(|request| async move { (request, self.ingest(request).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (request, outcome) in outcomes {
            match outcome {
                Ok(_) => stats.items_ingested += 1,
                Err(e) => {
                    log::warn!("Failed to ingest '{}': {e}", request.content_key);
                    stats.items_failed += 1;
                    stats.errors.push(IngestFailure {
                        content_key: request.content_key.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        log::info!(
            "Ingested {} items ({} failed) in {}ms",
            stats.items_ingested,
            stats.items_failed,
            stats.duration_ms
        );
        stats
    }

    /// Ingest every supported file under `root`.
    ///
    /// Each file's stem is its content key, its file name the display name,
    /// and its parent folder relative to `root` the group.
    pub async fn ingest_directory(&self, root: &Path) -> Result<IngestStats> {
        let options = FindOptions::with_extensions(
            IMAGE_EXTENSIONS.iter().chain(TEXT_EXTENSIONS.iter()),
        );
        let files = find_all_files(root, options).await?;

        let requests: Vec<IngestRequest> = files
            .iter()
            .map(|file| {
                IngestRequest::new(
                    &file.stem,
                    &file.path,
                    &file.file_name,
                    FileKind::from_path(&file.path),
                )
                .with_group(file.relative_folder())
            })
            .collect();

        Ok(self.ingest_batch(&requests).await)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Rank items against a text query.
    pub async fn query_by_text(&self, text: &str, top_k: usize) -> Result<Vec<QueryResult>> {
        let embedding = self.text.extract(text);
        self.ranked(&embedding, top_k).await
    }

    /// Rank items against a query image.
    pub async fn query_by_image(
        &self,
        source: &ImageSource,
        top_k: usize,
    ) -> Result<Vec<QueryResult>> {
        let embedding = self.image.extract_source(source).await?;
        self.ranked(&embedding, top_k).await
    }

    async fn ranked(&self, embedding: &Embedding, top_k: usize) -> Result<Vec<QueryResult>> {
        let hits = self.client.query(embedding, top_k).await?;
        Ok(hits.iter().map(QueryResult::from_hit).collect())
    }

    /// Validate and run a tagged query.
    pub async fn search(&self, request: &QueryRequest) -> Result<QueryResponse> {
        request.validate()?;

        let results = match &request.input {
            QueryInput::Text { text } => self.query_by_text(text, request.top_k).await?,
            QueryInput::Image { image } => self.query_by_image(image, request.top_k).await?,
        };
        Ok(QueryResponse::new(results))
    }

    /// Collection statistics.
    pub async fn stats(&self) -> CollectionStats {
        self.client.get_stats().await
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("client", &self.client)
            .field("default_top_k", &self.default_top_k)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
