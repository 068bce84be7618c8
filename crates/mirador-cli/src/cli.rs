//! CLI argument parsing and command definitions.

use clap::{Parser, Subcommand};
use mirador_vector::FileKind;

// ============================================================================
// CLI argument types
// ============================================================================

/// Top-level CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "mirador", author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "MIRADOR_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Embed and index a single file.
    Ingest {
        /// File to ingest.
        path: String,

        /// Content key (defaults to the file stem).
        #[arg(long)]
        key: Option<String>,

        /// Display name (defaults to the file name).
        #[arg(long)]
        name: Option<String>,

        /// File kind: image, text or other (defaults to the extension's kind).
        #[arg(long)]
        kind: Option<FileKind>,

        /// Group folder.
        #[arg(long, default_value = "")]
        group: String,
    },

    /// Embed and index every supported file under a directory.
    IngestDir {
        /// Directory to walk (defaults to `ingest.root` from config).
        dir: Option<String>,
    },

    /// Search the collection.
    Search(SearchCommand),

    /// Show collection statistics.
    Stats,

    /// Check that the vector store is reachable.
    Health,

    /// Print version information.
    Version,

    /// Configuration operations.
    Config(ConfigCommand),
}

/// Search subcommands.
#[derive(Parser, Debug)]
pub struct SearchCommand {
    /// Search mode to execute.
    #[command(subcommand)]
    pub mode: SearchMode,
}

/// Query modes.
#[derive(Subcommand, Debug)]
pub enum SearchMode {
    /// Rank items against a text query.
    Text {
        /// Query text.
        query: String,

        /// Maximum number of results.
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Rank items against a query image.
    Image {
        /// Path to the query image.
        path: String,

        /// Maximum number of results.
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Create a default configuration file.
    Init {
        /// Output file path (defaults to XDG config path).
        #[arg(short, long)]
        file: Option<String>,

        /// Overwrite existing file.
        #[arg(long)]
        force: bool,
    },

    /// Export configuration as environment variables.
    Export {
        /// Format as Docker --env flags.
        #[arg(long)]
        docker_env: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================
