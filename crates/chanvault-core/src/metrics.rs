//! Prometheus metrics helpers for the chanvault engine.
//!
//! This module provides centralized metrics initialization and the metric
//! definitions used across the engine components.
//!
//! # Usage
//!
//! ```rust,ignore
//! use chanvault_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = init_metrics();
//!     start_metrics_server(9090, handle).await.unwrap();
//!
//!     use metrics::counter;
//!     counter!("backfill_pages_total").increment(1);
//! }
//! ```
//!
//! # Naming Conventions
//!
//! - Prefix: component name (`backfill_`, `live_`, `download_`, `reconcile_`)
//! - Suffix: unit or type (`_total`, `_bytes`, `_seconds`)

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// Must be called once at startup before any metrics are recorded.
/// Returns a handle usable with [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_common_metrics();

    handle
}

/// Like [`init_metrics`] but returns `None` if the recorder is already
/// installed, instead of panicking. Useful for tests.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves the `/metrics` endpoint on the specified port. Spawns a background
/// task and returns immediately.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server failed: {}", e);
        }
    });

    Ok(())
}

/// Register descriptions for the metrics used across the engine.
///
/// Called automatically by [`init_metrics`].
fn register_common_metrics() {
    // Backfill sweep
    describe_counter!(
        "backfill_pages_total",
        "History pages processed during backfill"
    );
    describe_counter!(
        "backfill_messages_total",
        "Messages observed during backfill"
    );
    describe_counter!(
        "backfill_channels_skipped_total",
        "Channels skipped during a sweep (not whitelisted or no permission)"
    );
    describe_gauge!(
        "backfill_running",
        "Whether a full-server sweep is currently running (1=yes, 0=no)"
    );

    // Live path
    describe_counter!(
        "live_messages_total",
        "Live messages processed for eligible channels"
    );

    // Download worker
    describe_counter!(
        "download_files_total",
        "Attachment files successfully written to disk"
    );
    describe_counter!(
        "download_bytes_total",
        "Attachment bytes written to disk"
    );
    describe_counter!(
        "download_deduped_total",
        "Download tasks skipped because the file already exists"
    );
    describe_counter!(
        "download_dropped_total",
        "Download tasks abandoned after a fetch or write failure"
    );
    describe_counter!(
        "download_unknown_type_total",
        "Downloads with an unrecognized content type (stored as .bin)"
    );
    describe_gauge!("download_queue_depth", "Pending download tasks");

    // Reconciliation
    describe_counter!(
        "reconcile_folders_retired_total",
        "Backup folders moved to the quarantine root at startup"
    );
}

/// Increment a counter. Convenience wrapper around `metrics::counter!`.
#[inline]
pub fn increment(name: &'static str, count: u64) {
    metrics::counter!(name).increment(count);
}

/// Set a gauge value. Convenience wrapper around `metrics::gauge!`.
#[inline]
pub fn set_gauge(name: &'static str, value: f64) {
    metrics::gauge!(name).set(value);
}
