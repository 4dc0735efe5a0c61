//! Configuration for the Linkage service

use common::config::{
    load_config_with_options, ConfigLoader, ConfigValidation, DatabaseConfig, LoadOptions,
    LoggingConfig, MetricsConfig, ServerConfig,
};
use common::ConfigurationError as ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bare port variable honoured by container platforms
pub const PORT_ENV: &str = "PORT";

/// Main configuration structure for the Linkage service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkageConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Contact store settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics exporter settings
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LinkageConfig {
    /// Generate example configuration file
    pub fn generate_example() -> Result<String, ConfigError> {
        let config = Self::default();
        toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError {
            details: format!("Failed to serialize config: {e}"),
        })
    }

    /// Validate every section, logging non-fatal warnings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.metrics.validate()?;

        let warnings = self
            .server
            .warnings()
            .into_iter()
            .chain(self.database.warnings())
            .chain(self.logging.warnings())
            .chain(self.metrics.warnings());
        for warning in warnings {
            warn!("Configuration warning: {}", warning);
        }

        if self.metrics.enabled && self.metrics.prometheus.port == self.server.port {
            return Err(ConfigError::InvalidValue {
                key: "metrics.prometheus.port".to_string(),
                value: self.metrics.prometheus.port.to_string(),
                reason: "Metrics listener cannot share the HTTP port".to_string(),
            });
        }

        Ok(())
    }

    /// Apply the bare `PORT` value, if one was given
    pub fn apply_port_override(&mut self, port: Option<String>) -> Result<(), ConfigError> {
        let Some(raw) = port else {
            return Ok(());
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(());
        }

        let port = raw.parse::<u16>().map_err(|e| ConfigError::EnvironmentError {
            var: PORT_ENV.to_string(),
            details: format!("{raw:?} is not a valid port: {e}"),
        })?;
        info!("Using port {} from {}", port, PORT_ENV);
        self.server.port = port;
        Ok(())
    }

    fn finish(mut self) -> Result<Self, ConfigError> {
        self.apply_port_override(std::env::var(PORT_ENV).ok())?;
        self.validate()?;
        Ok(self)
    }
}

impl ConfigLoader<LinkageConfig> for LinkageConfig {
    fn load(path_override: Option<PathBuf>) -> Result<LinkageConfig, ConfigError> {
        let options = LoadOptions {
            config_path: path_override,
            ..LoadOptions::default()
        };
        load_config_with_options::<LinkageConfig>(options)?.finish()
    }

    fn load_from_file(path: &Path) -> Result<LinkageConfig, ConfigError> {
        common::config::load_from_file::<LinkageConfig>(path)?.finish()
    }
}
