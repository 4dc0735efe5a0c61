//! # Configuration Types
//!
//! Configuration sections shared by the Linkage service and its tooling.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{ConfigurationError, LinkageError};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub connect_timeout: u64,

    /// Idle timeout for pooled connections in seconds
    pub idle_timeout: Option<u64>,

    /// Maximum lifetime for pooled connections in seconds
    pub max_lifetime: Option<u64>,

    /// How long SQLite waits on a locked database, in milliseconds
    pub busy_timeout_ms: u64,

    /// Attempts made to open the pool at startup before giving up
    pub connect_retries: u32,

    /// Whether to create the schema on startup
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:linkage.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: 30,
            idle_timeout: Some(600),
            max_lifetime: Some(3600),
            busy_timeout_ms: 30_000,
            connect_retries: 3,
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    /// Configuration for a private in-memory database, used by tests
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            idle_timeout: None,
            max_lifetime: None,
            connect_retries: 0,
            ..Self::default()
        }
    }

    /// Whether the URL points at an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout.map(Duration::from_secs)
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime.map(Duration::from_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Internal binding host
    pub host: String,

    /// Internal binding port
    pub port: u16,

    /// Request timeout in seconds
    pub request_timeout: u64,

    /// CORS allowed origins, `*` for any
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: 30,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    /// Get the listening address
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Whether every origin is allowed
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,

    /// Also forward events to systemd-journald when it is reachable
    pub journald: bool,

    /// Additional log targets and their levels
    pub targets: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            journald: false,
            targets: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Build an `EnvFilter` directive string from the level and per-target overrides
    pub fn filter_directives(&self) -> String {
        let mut directives = vec![self.level.clone()];
        let mut targets: Vec<_> = self.targets.iter().collect();
        targets.sort();
        for (target, level) in targets {
            directives.push(format!("{target}={level}"));
        }
        directives.join(",")
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,

    /// Prometheus exporter configuration
    pub prometheus: PrometheusConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prometheus: PrometheusConfig::default(),
        }
    }
}

/// Prometheus exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    /// Host to bind Prometheus exporter to
    pub host: String,

    /// Port for Prometheus exporter
    pub port: u16,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9090,
        }
    }
}

impl PrometheusConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Common configuration validation trait
pub trait ConfigValidation {
    type Error: LinkageError;

    /// Validate the configuration
    fn validate(&self) -> Result<(), Self::Error>;

    /// Get configuration warnings (non-fatal issues)
    fn warnings(&self) -> Vec<String> {
        Vec::new()
    }
}

impl ConfigValidation for DatabaseConfig {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.url.is_empty() {
            return Err(ConfigurationError::InvalidValue {
                key: "database.url".to_string(),
                value: self.url.clone(),
                reason: "Database URL cannot be empty".to_string(),
            });
        }

        if !self.url.starts_with("sqlite:") {
            return Err(ConfigurationError::InvalidValue {
                key: "database.url".to_string(),
                value: self.url.clone(),
                reason: "Only sqlite: URLs are supported".to_string(),
            });
        }

        if self.max_connections == 0 {
            return Err(ConfigurationError::InvalidValue {
                key: "database.max_connections".to_string(),
                value: self.max_connections.to_string(),
                reason: "Max connections must be greater than 0".to_string(),
            });
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigurationError::InvalidValue {
                key: "database.min_connections".to_string(),
                value: self.min_connections.to_string(),
                reason: "Min connections cannot be greater than max connections".to_string(),
            });
        }

        Ok(())
    }

    fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.is_in_memory() && self.max_connections > 1 {
            warnings.push(
                "In-memory SQLite with more than one connection gives each connection its own database"
                    .to_string(),
            );
        }
        if !self.run_migrations {
            warnings.push("Schema creation disabled; the Contact table must already exist".to_string());
        }
        warnings
    }
}

impl ConfigValidation for ServerConfig {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.host.is_empty() {
            return Err(ConfigurationError::InvalidValue {
                key: "server.host".to_string(),
                value: self.host.clone(),
                reason: "Host cannot be empty".to_string(),
            });
        }

        if self.port == 0 {
            return Err(ConfigurationError::InvalidValue {
                key: "server.port".to_string(),
                value: self.port.to_string(),
                reason: "Port cannot be zero".to_string(),
            });
        }

        if self.request_timeout == 0 {
            return Err(ConfigurationError::InvalidValue {
                key: "server.request_timeout".to_string(),
                value: self.request_timeout.to_string(),
                reason: "Request timeout must be greater than 0 seconds".to_string(),
            });
        }

        Ok(())
    }
}

impl ConfigValidation for LoggingConfig {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        match self.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigurationError::InvalidValue {
                    key: "logging.level".to_string(),
                    value: self.level.clone(),
                    reason: "Valid levels are: trace, debug, info, warn, error".to_string(),
                })
            }
        }

        match self.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => Ok(()),
            _ => Err(ConfigurationError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.format.clone(),
                reason: "Valid formats are: json, pretty, compact".to_string(),
            }),
        }
    }
}

impl ConfigValidation for MetricsConfig {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.enabled && self.prometheus.port == 0 {
            return Err(ConfigurationError::InvalidValue {
                key: "metrics.prometheus.port".to_string(),
                value: self.prometheus.port.to_string(),
                reason: "Prometheus port cannot be zero when metrics are enabled".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_validation() {
        assert!(DatabaseConfig::default().validate().is_ok());
        assert!(DatabaseConfig::in_memory().validate().is_ok());

        let config = DatabaseConfig {
            url: "postgres://localhost/linkage".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DatabaseConfig {
            min_connections: 20,
            max_connections: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_in_memory_detection() {
        assert!(DatabaseConfig::in_memory().is_in_memory());
        assert!(!DatabaseConfig::default().is_in_memory());

        let shared = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 4,
            ..Default::default()
        };
        assert_eq!(shared.warnings().len(), 1);
    }

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_address(), "0.0.0.0:8080");
        assert!(config.allows_any_origin());

        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_logging_config_validation() {
        assert!(LoggingConfig::default().validate().is_ok());

        let config = LoggingConfig {
            level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LoggingConfig {
            format: "xml".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_filter_directives_include_targets() {
        let mut config = LoggingConfig::default();
        config.targets.insert("sqlx".to_string(), "warn".to_string());
        config.targets.insert("linkage".to_string(), "debug".to_string());

        assert_eq!(config.filter_directives(), "info,linkage=debug,sqlx=warn");
    }
}
