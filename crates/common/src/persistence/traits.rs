//! # Persistence Traits
//!
//! Core traits for database pool inspection.

use serde::{Deserialize, Serialize};

/// Connection pool statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionStats {
    pub active_connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
}

/// Anything that can report on its connection pool
pub trait PoolStats {
    fn connection_stats(&self) -> ConnectionStats;
}
