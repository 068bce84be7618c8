//! Mirador Core: shared error type and utilities.
//!
//! This crate provides the foundational pieces used across all Mirador
//! crates. It has no internal Mirador dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error type, `Result` alias, and error-kind inspectors
//! - [`util`]: Item identifier derivation and async file discovery

pub mod error;
pub mod util;

// Re-export key types at crate root for convenience
pub use error::{Error, ErrorKind, Result};

// Convenience re-exports from util
pub use util::ids::{item_id, ITEM_ID_BITS};
