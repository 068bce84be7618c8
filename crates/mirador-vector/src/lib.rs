//! Multimodal vector indexing and retrieval for Mirador.
//!
//! This crate turns images and short texts into fixed-length embeddings
//! with deterministic hand-crafted features, stores them in a vector
//! collection, and ranks stored items against text or image queries.
//!
//! # Features
//!
//! - `store-qdrant`: Enable the Qdrant REST backend
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     mirador-vector                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Retriever (validate → extract → upsert / query → map)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Extractors                                                 │
//! │  ├── ImageExtractor (histograms + stats + block texture)    │
//! │  └── TextExtractor (code points + length trailer)           │
//! │  EmbeddingComposer (L2 normalize, pad/truncate to D)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  IndexClient (dimension checks, deadlines, ranking)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VectorStore trait                                          │
//! │  ├── InMemoryVectorStore (always available)                 │
//! │  ├── QdrantStore (feature: store-qdrant)                    │
//! │  └── RetryingStore (backoff on transient failures)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use mirador_vector::{FileKind, IngestRequest, Retriever, VectorConfig};
//!
//! let config = VectorConfig { backend: "memory".into(), ..Default::default() };
//! let retriever = Retriever::connect(&config).await?;
//!
//! retriever
//!     .ingest(&IngestRequest::new("k1", "uploads/notes.txt", "notes.txt", FileKind::Text))
//!     .await?;
//!
//! for hit in retriever.query_by_text("notes", 5).await? {
//!     println!("{}: {:.1}%", hit.display_name, hit.similarity_percent);
//! }
//! ```

// Core modules (always available)
pub mod compose;
pub mod image_features;
pub mod text_features;
pub mod types;

// Index access
pub mod client;
pub mod retry;
pub mod store;

// Retrieval facade
pub mod facade;

// Feature-gated backend modules
#[cfg(feature = "store-qdrant")]
pub mod qdrant;

// Re-exports: core types
pub use types::{
    CollectionInfo, CollectionSpec, CollectionStats, CollectionStatus, DistanceMetric,
    EMBEDDING_DIM, Embedding, FileKind, ImageSource, IndexedItem, IngestFailure, IngestOutcome,
    IngestRequest, IngestStats, ItemMetadata, QueryInput, QueryRequest, QueryResponse,
    QueryResult, StoreHit, StorePoint, VectorConfig,
};

// Re-exports: extraction
pub use compose::EmbeddingComposer;
pub use image_features::{ImageExtractor, extract_image};
pub use text_features::{TextExtractor, extract_text, raw_text_features};

// Re-exports: index access
pub use client::IndexClient;
pub use retry::RetryingStore;
pub use store::{InMemoryVectorStore, VectorStore, create_vector_store};

// Re-exports: facade
pub use facade::Retriever;

// Feature-gated re-exports
#[cfg(feature = "store-qdrant")]
pub use qdrant::QdrantStore;
