//! Prometheus metrics for easel-host.
//!
//! Provides metrics collection and a Prometheus-compatible `/metrics` endpoint.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

const RPC_CALLS_TOTAL: &str = "easel_rpc_calls_total";
const RPC_DURATION: &str = "easel_rpc_duration_seconds";
const VALIDATION_FAILURES_TOTAL: &str = "easel_validation_failures_total";

/// Outcome label for a bridge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// Result returned without an `{error}` field.
    Ok,
    /// Protocol error (bad envelope, unknown method, bad params).
    RpcError,
    /// A remote service or local operation failed, whether reported as an
    /// RPC error or as an `{error}` result document.
    RemoteError,
}

impl CallOutcome {
    /// Label value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::RpcError => "rpc_error",
            Self::RemoteError => "remote_error",
        }
    }
}

/// Initialize metrics and return the Prometheus handle.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed
/// (e.g., if another recorder is already installed).
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record a bridge call.
///
/// # Arguments
///
/// * `method` - Bridge method, or `"unknown"` for unrecognised names
/// * `outcome` - How the call ended
/// * `duration_secs` - Handling time in seconds
pub fn record_rpc_call(method: &str, outcome: CallOutcome, duration_secs: f64) {
    counter!(
        RPC_CALLS_TOTAL,
        "method" => method.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!(RPC_DURATION, "method" => method.to_string()).record(duration_secs);
}

/// Record an input validation failure.
///
/// # Arguments
///
/// * `validation_type` - Type of validation that failed (query, prompt, dimension, project)
pub fn record_validation_failure(validation_type: &str) {
    counter!(
        VALIDATION_FAILURES_TOTAL,
        "type" => validation_type.to_string()
    )
    .increment(1);
}
