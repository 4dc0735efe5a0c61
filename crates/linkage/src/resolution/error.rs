use common::{LinkageError, PersistenceError, ValidationError};
use thiserror::Error;

/// Reasons a resolution can fail
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Invalid identify request: {0}")]
    Validation(#[from] ValidationError),

    /// The matched records do not form at most two well-formed clusters
    #[error("Found {primaries} primary contacts among {matches} matches; expected one or two")]
    ConsistencyViolation { primaries: usize, matches: usize },

    #[error("Contact store failure: {0}")]
    Store(#[from] PersistenceError),
}

impl LinkageError for ResolutionError {}

impl ResolutionError {
    /// Short label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ResolutionError::Validation(_) => "validation",
            ResolutionError::ConsistencyViolation { .. } => "consistency_violation",
            ResolutionError::Store(_) => "store_failure",
        }
    }
}
