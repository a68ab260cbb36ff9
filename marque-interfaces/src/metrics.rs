//! Metrics recorder interface
//!
//! Consumed by every component that guards an operation: one latency
//! observation and one outcome counter per call, tagged by operation
//! name. Recording is infallible by contract - a metrics failure must
//! never fail the operation being measured, so the trait methods do not
//! return results. Implementations forward to the process metrics sink
//! (Prometheus, StatsD, ...) outside this workspace.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a recorded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Error,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::Success => write!(f, "success"),
            OperationStatus::Error => write!(f, "error"),
        }
    }
}

/// Latency and outcome reporting for guarded operations
pub trait MetricsRecorder: Send + Sync {
    /// Record how long an operation took
    fn observe_latency(&self, operation: &str, duration: Duration);

    /// Record an operation outcome
    fn record_operation(&self, operation: &str, status: OperationStatus);
}

/// Shared metrics recorder handle
pub type SharedMetrics = Arc<dyn MetricsRecorder>;

/// Recorder that drops every observation
///
/// The default wiring for tests and for deployments without a sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn observe_latency(&self, _operation: &str, _duration: Duration) {}

    fn record_operation(&self, _operation: &str, _status: OperationStatus) {}
}

/// Recorder that emits observations through the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMetrics;

impl MetricsRecorder for LogMetrics {
    fn observe_latency(&self, operation: &str, duration: Duration) {
        log::debug!("metrics: {} took {:?}", operation, duration);
    }

    fn record_operation(&self, operation: &str, status: OperationStatus) {
        log::debug!("metrics: {} -> {}", operation, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_matches_tag() {
        assert_eq!(OperationStatus::Success.to_string(), "success");
        assert_eq!(OperationStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_recorders_never_fail() {
        let recorders: Vec<SharedMetrics> = vec![Arc::new(NoopMetrics), Arc::new(LogMetrics)];
        for recorder in recorders {
            recorder.observe_latency("get", Duration::from_millis(3));
            recorder.record_operation("get", OperationStatus::Success);
            recorder.record_operation("get", OperationStatus::Error);
        }
    }
}
