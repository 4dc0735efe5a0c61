//! Structured logging functions

use tracing::{debug, error, info, warn};

/// Log a brand-new primary contact
pub fn log_contact_created(contact_id: i64, email: &str, phone_number: &str) {
    info!(
        contact_id = contact_id,
        email = %email,
        phone_number = %phone_number,
        "Primary contact created"
    );
}

/// Log a secondary contact attached to an existing primary
pub fn log_secondary_linked(contact_id: i64, primary_id: i64) {
    info!(
        contact_id = contact_id,
        primary_id = primary_id,
        "Secondary contact linked"
    );
}

/// Log two clusters collapsing into one
pub fn log_clusters_merged(elder_id: i64, junior_id: i64, relinked: u64) {
    info!(
        elder_id = elder_id,
        junior_id = junior_id,
        relinked = relinked,
        "Contact clusters merged"
    );
}

/// Log an observation that added nothing new
pub fn log_duplicate_observation(primary_id: i64, matched: usize) {
    debug!(
        primary_id = primary_id,
        matched = matched,
        "Exact duplicate observation, no mutation"
    );
}

/// Log a broken cluster invariant found while resolving
pub fn log_consistency_violation(email: &str, phone_number: &str, primaries: &[i64]) {
    error!(
        email = %email,
        phone_number = %phone_number,
        ?primaries,
        "Contact store violates the single-primary invariant"
    );
}

/// Log a resolution abandoned because the store failed
pub fn log_resolution_failed(stage: &str, reason: &str) {
    warn!(
        stage = %stage,
        reason = %reason,
        "Identity resolution failed, unit of work rolled back"
    );
}
