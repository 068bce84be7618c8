//! Error types for Mirador operations.
//!
//! This module provides a common `Error` type and `Result<T>` alias used
//! across all Mirador crates. Uses `thiserror` for derive macros.
//!
//! Variants fall into three caller-facing kinds (see [`ErrorKind`]):
//!
//! - **Extraction**: unreadable or undecodable input; the item or query
//!   that produced it is aborted.
//! - **Index**: the vector store is unreachable, timed out, is missing the
//!   collection, or rejected a vector of the wrong dimension.
//! - **Validation**: a request is missing required fields; raised before
//!   any extraction work.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Boxed error used as the `source` of wrapped failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in Mirador operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific path.
    #[error("I/O error at {}: {source}", path.display())]
    IoWithPath {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request was rejected before any work was done.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Input could not be turned into an embedding.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Input could not be turned into an embedding, with the underlying cause.
    #[error("Extraction error: {message}: {source}")]
    ExtractionWithSource {
        /// What was being attempted.
        message: String,
        /// Underlying error.
        #[source]
        source: BoxError,
    },

    /// The vector store rejected or failed an operation.
    #[error("Index error: {0}")]
    Index(String),

    /// The vector store could not be reached or answered with a server error.
    #[error("Index unavailable: {message}")]
    IndexUnavailable {
        /// What was being attempted.
        message: String,
        /// Underlying transport error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// An embedding's length does not match the collection dimension.
    #[error("Dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch {
        /// Collection dimension.
        expected: usize,
        /// Embedding length supplied.
        actual: usize,
    },

    /// The target collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The deadline that was exceeded.
        timeout: Duration,
        /// Which stage the operation belonged to.
        origin: ErrorKind,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Filesystem or OS failure outside extraction.
    Io,
    /// Bad or missing configuration.
    Config,
    /// Request rejected before any work was done.
    Validation,
    /// Input could not be embedded.
    Extraction,
    /// Vector store failure.
    Index,
    /// Encoding or decoding failure.
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Io => "io",
            Self::Config => "config",
            Self::Validation => "validation",
            Self::Extraction => "extraction",
            Self::Index => "index",
            Self::Serialization => "serialization",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Wrap a plain I/O error.
    pub fn io(err: std::io::Error) -> Self {
        Self::Io(err)
    }

    /// Wrap an I/O error with the path that produced it.
    pub fn io_with_path(err: std::io::Error, path: impl AsRef<Path>) -> Self {
        Self::IoWithPath {
            path: path.as_ref().to_path_buf(),
            source: err,
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an extraction error.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create an extraction error wrapping an underlying cause.
    pub fn extraction_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ExtractionWithSource {
            message: msg.into(),
            source: Box::new(source),
        }
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::Index(msg.into())
    }

    /// Create an "index unavailable" error wrapping a transport failure.
    pub fn index_unavailable(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::IndexUnavailable {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an "index unavailable" error without an underlying cause
    /// (e.g. the store answered with a 5xx status).
    pub fn index_unavailable_msg(msg: impl Into<String>) -> Self {
        Self::IndexUnavailable {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create a timeout raised while reading or decoding input.
    pub fn extraction_timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
            origin: ErrorKind::Extraction,
        }
    }

    /// Create a timeout raised by a vector store round-trip.
    pub fn index_timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
            origin: ErrorKind::Index,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::IoWithPath { .. } => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Extraction(_) | Self::ExtractionWithSource { .. } => ErrorKind::Extraction,
            Self::Index(_)
            | Self::IndexUnavailable { .. }
            | Self::DimensionMismatch { .. }
            | Self::CollectionNotFound(_) => ErrorKind::Index,
            Self::Timeout { origin, .. } => *origin,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// True for failures turning input into an embedding.
    pub fn is_extraction(&self) -> bool {
        self.kind() == ErrorKind::Extraction
    }

    /// True for vector store failures.
    pub fn is_index(&self) -> bool {
        self.kind() == ErrorKind::Index
    }

    /// True for rejected requests.
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// True for timeouts of any stage.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Only transport failures and timeouts qualify; a dimension mismatch or
    /// a bad request fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::IndexUnavailable { .. } | Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using Mirador's Error type.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Tests
// ============================================================================
