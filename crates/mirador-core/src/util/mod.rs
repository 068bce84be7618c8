//! Utility modules for identifiers and file discovery.
//!
//! # Modules
//!
//! - [`ids`]: Stable item identifiers derived from content keys
//! - [`files`]: Async file discovery for directory ingestion

pub mod files;
pub mod ids;
