// Domain errors - Raised before any hardware interaction or while filling the matrix
use thiserror::Error;

/// A test plan that cannot be run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("node list is empty, configure at least one node")]
    EmptyNodeList,
    #[error("node target {0} is not a finite number")]
    InvalidNodeTarget(f64),
    #[error("{name} tolerance must be a finite non-negative number, got {value}")]
    InvalidTolerance { name: &'static str, value: f64 },
    #[error("malformed channel map: {0}")]
    MalformedChannelMap(String),
    #[error("invalid polling policy: {0}")]
    InvalidPolling(String),
    #[error("invalid stimulus profile: {0}")]
    InvalidStimulus(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    #[error("the result matrix has not been initialized")]
    NotInitialized,
    #[error("node column {index} is outside the matrix ({node_count} node columns)")]
    NodeIndexOutOfRange { index: usize, node_count: usize },
    #[error("node column {0} has already been written")]
    ColumnAlreadyWritten(usize),
    #[error("expected {expected} classified values, got {actual}")]
    RowCountMismatch { expected: usize, actual: usize },
    #[error("row {row} received the value of channel {channel}")]
    ChannelOutOfOrder { row: usize, channel: usize },
    #[error("node columns {0:?} were never written")]
    IncompleteColumns(Vec<usize>),
}
