//! Prometheus metrics for identity resolution

use anyhow::{Context, Result};
use common::MetricsConfig;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

use crate::resolution::{Resolution, ResolutionError};

pub const RESOLUTIONS_TOTAL: &str = "linkage_resolutions_total";
pub const RESOLUTION_FAILURES_TOTAL: &str = "linkage_resolution_failures_total";
pub const RESOLUTION_DURATION_SECONDS: &str = "linkage_resolution_duration_seconds";
pub const CONTACTS_RELINKED_TOTAL: &str = "linkage_contacts_relinked_total";
pub const HTTP_REQUESTS_TOTAL: &str = "linkage_http_requests_total";

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    describe_counter!(
        RESOLUTIONS_TOTAL,
        "Completed identity resolutions by outcome"
    );
    describe_counter!(
        RESOLUTION_FAILURES_TOTAL,
        "Identity resolutions that failed, by failure kind"
    );
    describe_histogram!(
        RESOLUTION_DURATION_SECONDS,
        "Time spent inside a resolution unit of work"
    );
    describe_counter!(
        CONTACTS_RELINKED_TOTAL,
        "Secondary contacts re-pointed to an elder primary during merges"
    );
    describe_counter!(
        HTTP_REQUESTS_TOTAL,
        "Identify requests by response status class"
    );
}

pub fn record_resolution(resolution: &Resolution, elapsed: Duration) {
    counter!(RESOLUTIONS_TOTAL, "outcome" => resolution.as_str()).increment(1);
    histogram!(RESOLUTION_DURATION_SECONDS).record(elapsed.as_secs_f64());
    if let Resolution::Merged { relinked, .. } = resolution {
        counter!(CONTACTS_RELINKED_TOTAL).increment(*relinked);
    }
}

pub fn record_resolution_failure(error: &ResolutionError) {
    counter!(RESOLUTION_FAILURES_TOTAL, "kind" => error.kind()).increment(1);
}

pub fn record_http_request(status: u16) {
    let class = match status {
        200..=299 => "2xx",
        400..=499 => "4xx",
        _ => "5xx",
    };
    counter!(HTTP_REQUESTS_TOTAL, "status" => class).increment(1);
}

/// Install the Prometheus exporter when metrics are enabled
pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        info!("Metrics collection disabled");
        return Ok(());
    }

    let address = config.prometheus.listen_address();
    let socket_addr: SocketAddr = address
        .parse()
        .with_context(|| format!("Invalid metrics listen address {address}"))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;
    describe_metrics();

    info!("Metrics server started on http://{}/metrics", address);
    Ok(())
}
