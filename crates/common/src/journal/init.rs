//! Journal initialization

use anyhow::Context;
use tracing::info;

use crate::config::LoggingConfig;

/// Initialize the journal system from the logging configuration
///
/// `RUST_LOG` wins over the configured level when it is set.
pub fn init_journal(config: &LoggingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.filter_directives())
            .context("Invalid logging level or target directives")?,
    };

    let fmt_layer = match config.format.to_lowercase().as_str() {
        "json" => fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .boxed(),
        "compact" => fmt::layer().compact().with_target(false).boxed(),
        _ => fmt::layer().with_target(false).boxed(),
    };

    // journald is optional; fall back to console only when the socket is absent
    let journal_layer = if config.journald {
        tracing_journald::layer().ok()
    } else {
        None
    };
    let journald_active = journal_layer.is_some();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(journal_layer)
        .try_init()
        .context("Global tracing subscriber already installed")?;

    if journald_active {
        info!("Journal initialized with systemd journald");
    } else {
        info!(format = %config.format, "Journal initialized with console logging");
    }

    Ok(())
}
