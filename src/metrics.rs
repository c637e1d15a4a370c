//! Prometheus metrics for backup and restore operations.
//!
//! Counters go through the [`metrics`](::metrics) facade; nothing is
//! recorded until a recorder is installed with [`install_recorder`], so
//! library and test use costs nothing.
//!
//! # Metrics
//!
//! - `whis_backups_total{outcome}` - backup attempts by outcome
//! - `whis_restores_total{outcome}` - restore attempts by outcome
//! - `whis_restore_item_errors_total` - per-item/per-image restore errors
//! - `whis_http_requests_total{operation}` - backup API calls by operation

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Installs the global Prometheus recorder and returns a render handle.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    describe();
    Ok(handle)
}

fn describe() {
    ::metrics::describe_counter!("whis_backups_total", "Backup attempts by outcome");
    ::metrics::describe_counter!("whis_restores_total", "Restore attempts by outcome");
    ::metrics::describe_counter!(
        "whis_restore_item_errors_total",
        "Items or images a restore could not bring back"
    );
    ::metrics::describe_counter!("whis_http_requests_total", "Backup API calls by operation");
}

/// Records a finished backup attempt. `outcome` is `"completed"` or an
/// error kind.
pub fn record_backup(outcome: &'static str) {
    ::metrics::counter!("whis_backups_total", "outcome" => outcome).increment(1);
}

/// Records a finished restore attempt and its per-item error count.
pub fn record_restore(outcome: &'static str, item_errors: usize) {
    ::metrics::counter!("whis_restores_total", "outcome" => outcome).increment(1);
    if item_errors > 0 {
        ::metrics::counter!("whis_restore_item_errors_total").increment(item_errors as u64);
    }
}

/// Records a backup API call.
pub fn record_http_operation(operation: &'static str) {
    ::metrics::counter!("whis_http_requests_total", "operation" => operation).increment(1);
}
