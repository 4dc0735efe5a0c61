//! # Configuration Abstractions
//!
//! Layered configuration loading and the configuration sections shared by
//! every Linkage binary.

pub mod loader;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use loader::*;
pub use traits::*;
pub use types::*;
