//! Simple journal system using tracing
//!
//! This module provides a lightweight structured logging system that writes
//! to the console in the configured format and, when asked to, forwards to
//! systemd's journal as well.

pub mod init;
pub mod logging;

// Re-export public API
pub use init::init_journal;
pub use logging::*;
