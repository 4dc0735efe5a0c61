//! # Database Connection Utilities
//!
//! SQLite pool construction from [`DatabaseConfig`], retry with exponential
//! backoff for the initial connection, and a cheap health probe.

use std::time::Duration;

#[cfg(feature = "sqlite")]
use tracing::info;

#[cfg(feature = "sqlite")]
use crate::config::DatabaseConfig;
use crate::error::PersistenceError;

/// Connection pool type alias for SQLite
#[cfg(feature = "sqlite")]
pub type SqlitePool = sqlx::SqlitePool;

/// Build the SQLite connection options for a configuration
#[cfg(feature = "sqlite")]
pub fn sqlite_connect_options(
    config: &DatabaseConfig,
) -> Result<sqlx::sqlite::SqliteConnectOptions, PersistenceError> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
    use std::str::FromStr;

    let mut options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| PersistenceError::ConnectionFailed {
            source: Box::new(e),
        })?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout());

    if !config.is_in_memory() {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    Ok(options)
}

/// Open a SQLite connection pool
#[cfg(feature = "sqlite")]
pub async fn establish_sqlite_pool(
    config: &DatabaseConfig,
) -> Result<SqlitePool, PersistenceError> {
    use sqlx::sqlite::SqlitePoolOptions;

    let options = sqlite_connect_options(config)?;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .connect_with(options)
        .await
        .map_err(|e| PersistenceError::ConnectionFailed {
            source: Box::new(e),
        })?;

    info!(
        "SQLite connection pool established with {} max connections",
        config.max_connections
    );

    Ok(pool)
}

/// Open a SQLite pool, retrying with backoff as configured
#[cfg(feature = "sqlite")]
pub async fn establish_sqlite_pool_with_retry(
    config: &DatabaseConfig,
) -> Result<SqlitePool, PersistenceError> {
    establish_connection_with_retry(
        || establish_sqlite_pool(config),
        config.connect_retries,
        Duration::from_millis(500),
    )
    .await
}

/// Generic connection establishment with retry logic
pub async fn establish_connection_with_retry<F, Fut, T>(
    mut connect_fn: F,
    max_retries: u32,
    initial_delay: Duration,
) -> Result<T, PersistenceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, PersistenceError>>,
{
    let mut delay = initial_delay;
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match connect_fn().await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                if attempt < max_retries {
                    tracing::warn!(
                        "Database connection attempt {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        e,
                        delay
                    );

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(60));
                }
                last_error = Some(e);
            }
        }
    }

    Err(
        last_error.unwrap_or_else(|| PersistenceError::ConnectionFailed {
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "Unknown connection error",
            )),
        }),
    )
}

/// Test SQLite connection health
#[cfg(feature = "sqlite")]
pub async fn test_sqlite_connection_health(pool: &SqlitePool) -> Result<(), PersistenceError> {
    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| PersistenceError::from_sqlx("acquire connection", e))?;

    sqlx::query("SELECT 1")
        .execute(&mut *conn)
        .await
        .map_err(|e| PersistenceError::from_sqlx("SELECT 1", e))?;

    Ok(())
}

#[cfg(feature = "sqlite")]
impl super::traits::PoolStats for SqlitePool {
    fn connection_stats(&self) -> super::traits::ConnectionStats {
        let size = self.size();
        let idle = self.num_idle() as u32;
        super::traits::ConnectionStats {
            active_connections: size.saturating_sub(idle),
            idle_connections: idle,
            max_connections: self.options().get_max_connections(),
        }
    }
}
