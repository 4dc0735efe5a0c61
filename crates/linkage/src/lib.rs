//! # Linkage
//!
//! Reconciles observed (email, phone) contact pairs into identity clusters.
//! Each cluster has exactly one primary contact, its oldest record; every
//! other record links directly to it as a secondary. Observations that bridge
//! two clusters merge them under the elder primary.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod resolution;
pub mod server;

pub use error::{Error, Result};

/// Version of the Linkage service
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
