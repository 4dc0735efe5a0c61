//! # Configuration Loader
//!
//! Figment-based configuration loading with layered support:
//! 1. Compiled defaults
//! 2. Configuration file (TOML)
//! 3. Environment variable overrides
//!
//! Supports automatic environment variable mapping with prefixes.

use crate::error::ConfigurationError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "linkage.toml";

/// Environment variable prefix for Linkage
pub const DEFAULT_ENV_PREFIX: &str = "LINKAGE";

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "LINKAGE_CONFIG_PATH";

/// Load configuration from specific file
///
/// The file must exist; environment overrides still apply on top of it.
pub fn load_from_file<T>(path: &Path) -> Result<T, ConfigurationError>
where
    T: Default + DeserializeOwned + serde::Serialize,
{
    let options = LoadOptions {
        config_path: Some(path.to_path_buf()),
        env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        require_file: true,
    };
    load_config_with_options::<T>(options)
}

/// Configuration loading options
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Optional path to configuration file
    pub config_path: Option<PathBuf>,
    /// Environment variable prefix
    pub env_prefix: String,
    /// Whether configuration file is required
    pub require_file: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            require_file: false,
        }
    }
}

/// Load configuration with custom options
///
/// # Configuration Layer Priority (highest to lowest)
/// 1. Environment variables (`<prefix>_*`)
/// 2. Configuration file (explicit path, `LINKAGE_CONFIG_PATH`, or a default location)
/// 3. Compiled defaults
///
/// Nested fields use a double underscore: `LINKAGE_DATABASE__URL`.
pub fn load_config_with_options<T>(options: LoadOptions) -> Result<T, ConfigurationError>
where
    T: Default + DeserializeOwned + serde::Serialize,
{
    info!("Loading configuration with options: {:?}", options);

    let mut figment = Figment::new().merge(Serialized::defaults(T::default()));

    let config_path = determine_config_path(options.config_path)?;

    if let Some(path) = &config_path {
        if path.exists() {
            info!("Loading configuration from file: {}", path.display());
            figment = add_file_provider(figment, path)?;
        } else if options.require_file {
            return Err(ConfigurationError::FileNotFound {
                path: path.display().to_string(),
            });
        } else {
            warn!(
                "Configuration file not found: {} (using defaults)",
                path.display()
            );
        }
    }

    debug!(
        "Loading environment variables with prefix: {}",
        options.env_prefix
    );
    figment = figment.merge(
        Env::prefixed(&format!("{}_", options.env_prefix))
            .split("__")
            .ignore(&["CONFIG_PATH"]),
    );

    let config: T = figment
        .extract()
        .map_err(|err| ConfigurationError::ParseError {
            details: format!("Failed to parse configuration: {err}"),
        })?;

    info!("Configuration loaded successfully");
    debug!(
        "Configuration loaded from {} sources",
        figment.metadata().count()
    );

    Ok(config)
}

/// Determine configuration file path with fallback logic
fn determine_config_path(
    override_path: Option<PathBuf>,
) -> Result<Option<PathBuf>, ConfigurationError> {
    if let Some(path) = override_path {
        return Ok(Some(path));
    }

    if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        debug!("Using config path from environment: {}", path.display());
        return Ok(Some(path));
    }

    let current_dir_config = std::env::current_dir()
        .map_err(|e| ConfigurationError::EnvironmentError {
            var: "current_dir".to_string(),
            details: e.to_string(),
        })?
        .join(DEFAULT_CONFIG_FILE);

    if current_dir_config.exists() {
        debug!(
            "Found config file in current directory: {}",
            current_dir_config.display()
        );
        return Ok(Some(current_dir_config));
    }

    let config_locations = [
        "/etc/linkage/linkage.toml",
        "~/.config/linkage/linkage.toml",
        "./config/linkage.toml",
    ];

    for location in &config_locations {
        let path = expand_path(location)?;
        if path.exists() {
            debug!("Found config file at: {}", path.display());
            return Ok(Some(path));
        }
    }

    debug!("No configuration file found, using defaults");
    Ok(None)
}

/// Add file provider to figment based on file extension
fn add_file_provider(figment: Figment, path: &Path) -> Result<Figment, ConfigurationError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("toml");

    match extension.to_lowercase().as_str() {
        "toml" => Ok(figment.merge(Toml::file(path))),
        _ => Err(ConfigurationError::ParseError {
            details: format!(
                "Unsupported configuration file format: {extension} (supported: toml)"
            ),
        }),
    }
}

/// Expand a leading tilde to `$HOME`
fn expand_path(path: &str) -> Result<PathBuf, ConfigurationError> {
    let expanded = if path.starts_with('~') {
        if let Ok(home) = std::env::var("HOME") {
            path.replacen('~', &home, 1)
        } else {
            return Err(ConfigurationError::EnvironmentError {
                var: "HOME".to_string(),
                details: "HOME environment variable not set".to_string(),
            });
        }
    } else {
        path.to_string()
    };

    Ok(PathBuf::from(expanded))
}
