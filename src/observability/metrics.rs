//! Prometheus metrics for the index reaper.
//!
//! Provides metrics for:
//! - Reaper invocations and failures
//! - Index rows deleted per table
//! - RRD file removal outcomes

#[cfg(feature = "prometheus")]
use metrics::{counter, gauge};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Initialize the metrics system with the given configuration.
///
/// Installs the global recorder and serves `/metrics` on `config.listen`.
/// Must be called from within a tokio runtime.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen)
        .install()?;

    tracing::info!(listen = %config.listen, "Prometheus exporter listening");

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if config.enabled {
        tracing::warn!(
            "Metrics are enabled in config but the 'prometheus' feature is not compiled. \
            Rebuild with: cargo build --features prometheus"
        );
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record one invocation of the index reaper.
pub fn record_index_delete_run() {
    #[cfg(feature = "prometheus")]
    {
        counter!("index_delete_runs_total").increment(1);
    }
}

/// Mirror a named statistics value (e.g. `deleteCntEndpoint`) as a gauge.
pub fn set_index_delete_stat(name: &str, value: u64) {
    #[cfg(feature = "prometheus")]
    {
        gauge!("index_delete_stat", "name" => name.to_string()).set(value as f64);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (name, value);
    }
}

/// Record index rows deleted.
///
/// # Arguments
/// * `table` - The index table (`endpoint`, `tag_endpoint`, `endpoint_counter`)
/// * `count` - Rows affected by the bulk delete
pub fn record_index_deletion(table: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "index_delete_rows",
            "table" => table.to_string()
        )
        .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (table, count);
    }
}

/// Record the outcome of one RRD file removal (`removed`, `not_found`, `failed`).
pub fn record_rrd_removal(outcome: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "index_delete_rrd_removals_total",
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = outcome;
    }
}

/// Record a run that aborted, labelled by the failing phase.
pub fn record_index_delete_error(phase: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "index_delete_errors_total",
            "phase" => phase.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = phase;
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_harmless() {
        record_index_delete_run();
        set_index_delete_stat("deleteCntEndpoint", 3);
        record_index_deletion("endpoint", 3);
        record_rrd_removal("removed");
        record_index_delete_error("select");
    }

    #[test]
    fn test_disabled_metrics_init_is_noop() {
        let config = MetricsConfig::default();
        assert!(!config.enabled);
        assert!(init_metrics(&config).is_ok());
    }
}
