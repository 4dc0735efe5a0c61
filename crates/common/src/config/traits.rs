//! # Configuration Traits
//!
//! Core traits for configuration loading and management.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::error::ConfigurationError;

/// Configuration loader trait
///
/// Provides a standardized interface for loading configuration from various sources
/// with layered configuration support (defaults, files, environment variables).
pub trait ConfigLoader<C: DeserializeOwned + Send + Sync> {
    /// Load configuration with optional path override
    ///
    /// Implementations layer compiled defaults, then the file, then
    /// environment variables, and validate the result before returning it.
    fn load(path_override: Option<PathBuf>) -> Result<C, ConfigurationError>;

    /// Load configuration from a specific file, which must exist
    fn load_from_file(path: &Path) -> Result<C, ConfigurationError>;
}
