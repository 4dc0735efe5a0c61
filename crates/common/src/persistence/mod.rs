//! # Persistence Abstractions
//!
//! Pool bootstrap, health probes and connection statistics shared by the
//! Linkage stores.

pub mod connection;
pub mod traits;

// Re-export commonly used types
pub use connection::*;
pub use traits::*;
