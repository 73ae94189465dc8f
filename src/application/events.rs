// Event sink - Ordered progress and diagnostics stream shared by the engine and its caller
use crate::application::error::{AbortReason, PortError};
use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Terminal status of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Completed,
    Aborted(AbortReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    RunStarted {
        serial: String,
        node_count: usize,
    },
    Connected,
    ConnectionFailed {
        error: PortError,
    },
    StimulusBurst {
        node_index: usize,
        low: u16,
        high: u16,
    },
    StimulusReady,
    StimulusNotReady {
        waited: Duration,
    },
    StimulusFault {
        node_index: usize,
        offset: u16,
        error: PortError,
    },
    StimulusFinished {
        writes: usize,
        faults: usize,
    },
    NodeStarted {
        node_index: usize,
        target: f64,
    },
    Waiting {
        node_index: usize,
        observed: f64,
        target: f64,
        deadline: DateTime<Local>,
    },
    NodeReached {
        node_index: usize,
        observed: f64,
        target: f64,
    },
    ColumnWritten {
        node_index: usize,
    },
    RunFinished(RunStatus),
    ReportPublished {
        location: String,
    },
    ReportFailed {
        error: String,
    },
}

impl EngineEvent {
    pub fn severity(&self) -> Severity {
        match self {
            EngineEvent::StimulusNotReady { .. } | EngineEvent::StimulusFault { .. } => {
                Severity::Warning
            }
            EngineEvent::ConnectionFailed { .. }
            | EngineEvent::RunFinished(RunStatus::Aborted(_))
            | EngineEvent::ReportFailed { .. } => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::RunStarted { serial, node_count } => {
                write!(f, "unit {serial}: starting test over {node_count} nodes")
            }
            EngineEvent::Connected => write!(f, "pack controller connected"),
            EngineEvent::ConnectionFailed { error } => {
                write!(f, "connecting to pack controller failed: {error}")
            }
            EngineEvent::StimulusBurst {
                node_index,
                low,
                high,
            } => write!(
                f,
                "stimulus: writing node {} ramp values in {low}..={high}",
                node_index + 1
            ),
            EngineEvent::StimulusReady => write!(f, "stimulus: first burst issued"),
            EngineEvent::StimulusNotReady { waited } => write!(
                f,
                "stimulus: no readiness signal after {:?}, starting acquisition anyway",
                waited
            ),
            EngineEvent::StimulusFault {
                node_index,
                offset,
                error,
            } => write!(
                f,
                "stimulus: write to register {offset} for node {} failed: {error}",
                node_index + 1
            ),
            EngineEvent::StimulusFinished { writes, faults } => {
                write!(f, "stimulus: finished after {writes} writes, {faults} failed")
            }
            EngineEvent::NodeStarted { node_index, target } => {
                write!(f, "node {}: expecting aggregate voltage {target}", node_index + 1)
            }
            EngineEvent::Waiting {
                node_index,
                observed,
                target,
                deadline,
            } => write!(
                f,
                "node {}: aggregate voltage {observed}, expected {target}, waiting until {}",
                node_index + 1,
                deadline.format("%Y-%m-%d %H:%M:%S")
            ),
            EngineEvent::NodeReached {
                node_index,
                observed,
                target,
            } => write!(
                f,
                "node {}: aggregate voltage {observed} reached target {target}, reading channels",
                node_index + 1
            ),
            EngineEvent::ColumnWritten { node_index } => {
                write!(f, "node {}: channel data recorded", node_index + 1)
            }
            EngineEvent::RunFinished(RunStatus::Completed) => write!(f, "test completed"),
            EngineEvent::RunFinished(RunStatus::Aborted(reason)) => {
                write!(f, "test aborted: {reason}")
            }
            EngineEvent::ReportPublished { location } => write!(f, "report written to {location}"),
            EngineEvent::ReportFailed { error } => write!(f, "report generation failed: {error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub at: DateTime<Local>,
    pub event: EngineEvent,
}

pub type EventStream = UnboundedReceiverStream<EventRecord>;

/// Producer side of the event stream. Cloneable, never blocks.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<EventRecord>,
}

impl EventSink {
    pub fn channel() -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, UnboundedReceiverStream::new(rx))
    }

    /// Every event is also traced; a closed stream only loses the copy.
    pub fn emit(&self, event: EngineEvent) {
        match event.severity() {
            Severity::Info => tracing::info!("{}", event),
            Severity::Warning => tracing::warn!("{}", event),
            Severity::Error => tracing::error!("{}", event),
        }

        let record = EventRecord {
            at: Local::now(),
            event,
        };
        let _ = self.tx.send(record);
    }
}
