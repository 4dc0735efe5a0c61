//! # Common Linkage
//!
//! Shared error definitions, layered configuration, SQLite pool bootstrap and
//! structured logging for the Linkage identity service.
//!
//! ## Key Features
//! - Error handling with the `LinkageError` marker trait
//! - Figment-based configuration loading (defaults, TOML file, environment)
//! - SQLite pool construction with retry and health probes
//! - Tracing subscriber setup and domain log events

pub mod config;
pub mod error;
pub mod journal;
pub mod persistence;

// Re-export commonly used types at the crate root for convenience
pub use config::*;
pub use error::*;

pub use persistence::traits as persistence_traits;
pub use persistence::traits::*;

/// Version of the common crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
