// Engine errors - What can stop a run, and what the caller sees
use crate::domain::error::{ConfigurationError, MatrixError};
use std::path::PathBuf;
use thiserror::Error;

/// Failure of the register link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("device is not connected")]
    NotConnected,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("short read: expected {expected} registers, got {actual}")]
    ShortRead { expected: usize, actual: usize },
    #[error("device did not answer in time")]
    Timeout,
}

/// Why a started run ended without a report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AbortReason {
    #[error("node {} timed out, last observed aggregate voltage {last_observed}", .node_index + 1)]
    NodeTimeout {
        node_index: usize,
        last_observed: f64,
    },
    #[error("telemetry read failed at node {}: {source}", .node_index + 1)]
    Telemetry {
        node_index: usize,
        #[source]
        source: PortError,
    },
    #[error("run cancelled at node {}", .node_index + 1)]
    Cancelled { node_index: usize },
    #[error("result matrix rejected node {}: {source}", .node_index + 1)]
    Matrix {
        node_index: usize,
        #[source]
        source: MatrixError,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("telemetry port unavailable: {0}")]
    Connection(#[source] PortError),
    #[error("run aborted: {0}")]
    Aborted(AbortReason),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode report: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Report(#[from] ReportError),
}
