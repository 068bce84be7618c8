//! Mirador CLI application.
//!
//! Loads configuration, installs logging, connects a [`Retriever`] and
//! dispatches commands. Search and stats results are printed as JSON.

use crate::cli::{CliArgs, Command, SearchMode};
use crate::config::MiradorConfig;
use crate::config_handlers;
use mirador_core::{Error, Result};
use mirador_vector::{
    CollectionStatus, FileKind, ImageSource, IngestOutcome, IngestRequest, IngestStats,
    QueryRequest, QueryResponse, Retriever,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ============================================================================
// MiradorCli
// ============================================================================

/// The `mirador` command-line application.
pub struct MiradorCli {
    name: String,
    config: Arc<MiradorConfig>,
    version: String,
}

impl MiradorCli {
    /// Create from CLI args, loading config from file/env.
    pub fn from_args(name: impl Into<String>, args: &CliArgs) -> Result<Self> {
        let config = MiradorConfig::load(args.config.as_deref())?;
        Ok(Self::new(name, config))
    }

    /// Create a new CLI application.
    pub fn new(name: impl Into<String>, config: MiradorConfig) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(config),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &MiradorConfig {
        &self.config
    }

    /// Initialise tracing-based logging.
    ///
    /// Uses `RUST_LOG` env var if set, otherwise defaults based on verbosity flags.
    pub fn init_logging(&self, verbose: bool, quiet: bool) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if quiet {
            EnvFilter::new("warn")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        };

        // A subscriber may already be installed (e.g. in tests).
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Run the CLI with the given arguments.
    pub async fn run(&self, args: CliArgs) -> Result<()> {
        self.init_logging(args.verbose, args.quiet);

        match args.command {
            Some(Command::Version) => {
                println!("{} {}", self.name, self.version);
                Ok(())
            }
            Some(Command::Health) => {
                let backend = self.health().await?;
                println!("{}: healthy ({backend})", self.name);
                Ok(())
            }
            Some(Command::Stats) => {
                let retriever = self.connect().await?;
                print_json(&retriever.stats().await)
            }
            Some(Command::Ingest {
                path,
                key,
                name,
                kind,
                group,
            }) => {
                let request = ingest_request(Path::new(&path), key, name, kind, group);
                print_json(&self.ingest(&request).await?)
            }
            Some(Command::IngestDir { dir }) => {
                let stats = self.ingest_dir(dir.as_deref()).await?;
                print_json(&stats)
            }
            Some(Command::Search(search)) => print_json(&self.search(search.mode).await?),
            Some(Command::Config(config_cmd)) => {
                config_handlers::handle_config_command(args.config.as_deref(), config_cmd.command)
            }
            None => {
                println!("{} {} - use --help for usage", self.name, self.version);
                Ok(())
            }
        }
    }

    async fn connect(&self) -> Result<Retriever> {
        tracing::debug!(
            backend = %self.config.vector.backend,
            collection = %self.config.vector.collection,
            "Connecting to vector store"
        );
        Retriever::connect(&self.config.vector).await
    }

    async fn health(&self) -> Result<String> {
        let retriever = self.connect().await?;
        let stats = retriever.stats().await;
        match stats.status {
            CollectionStatus::Ready => Ok(retriever.client().backend_name().to_string()),
            CollectionStatus::Error => Err(Error::index(
                stats
                    .error
                    .unwrap_or_else(|| "collection unavailable".to_string()),
            )),
        }
    }

    async fn ingest(&self, request: &IngestRequest) -> Result<IngestOutcome> {
        self.connect().await?.ingest(request).await
    }

    async fn ingest_dir(&self, dir: Option<&str>) -> Result<IngestStats> {
        let root = dir
            .or(self.config.ingest.root.as_deref())
            .map(PathBuf::from)
            .ok_or_else(|| {
                Error::validation("No directory given and `ingest.root` is not configured")
            })?;
        self.connect().await?.ingest_directory(&root).await
    }

    async fn search(&self, mode: SearchMode) -> Result<QueryResponse> {
        let default_top_k = self.config.vector.default_top_k;
        let request = match mode {
            SearchMode::Text { query, top_k } => {
                QueryRequest::text(query).with_top_k(top_k.unwrap_or(default_top_k))
            }
            SearchMode::Image { path, top_k } => {
                QueryRequest::image(ImageSource::Path(PathBuf::from(path)))
                    .with_top_k(top_k.unwrap_or(default_top_k))
            }
        };
        self.connect().await?.search(&request).await
    }
}

/// Build an ingest request, filling unset fields from the path.
fn ingest_request(
    path: &Path,
    key: Option<String>,
    name: Option<String>,
    kind: Option<FileKind>,
    group: String,
) -> IngestRequest {
    let file_name = || {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    let stem = || {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    IngestRequest::new(
        key.unwrap_or_else(stem),
        path,
        name.unwrap_or_else(file_name),
        kind.unwrap_or_else(|| FileKind::from_path(path)),
    )
    .with_group(group)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
