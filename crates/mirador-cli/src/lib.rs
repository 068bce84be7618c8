//! Command-line front end for Mirador.
//!
//! Wraps [`mirador_vector::Retriever`] in a `mirador` binary with ingest,
//! search, stats and config subcommands.
//!
//! # Key Abstractions
//!
//! - [`MiradorCli`]: loads configuration, installs logging, dispatches commands
//! - [`CliArgs`]: clap argument tree
//! - [`MiradorConfig`]: TOML + environment configuration via `confyg`

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;

pub use app::MiradorCli;
pub use cli::{CliArgs, Command, ConfigAction, ConfigCommand, SearchCommand, SearchMode};
pub use config::{IngestConfig, MiradorConfig};
