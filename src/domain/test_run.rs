// Test run - A single pass over the node sequence for one unit under test
use super::channel::ChannelMap;
use super::error::MatrixError;
use super::matrix::{MatrixBuilder, NodeColumn, ResultMatrix};
use super::node::NodeList;
use super::telemetry::{ClassifiedValue, ToleranceRule};
use chrono::{DateTime, Local};
use serde::Serialize;

/// A run in progress. Owned by the sequencer, never reused.
#[derive(Debug)]
pub struct TestRun {
    serial: String,
    started_at: DateTime<Local>,
    nodes: NodeList,
    channels: ChannelMap,
    tolerance: ToleranceRule,
    matrix: Option<MatrixBuilder>,
}

impl TestRun {
    pub fn start(
        serial: impl Into<String>,
        nodes: NodeList,
        channels: ChannelMap,
        tolerance: ToleranceRule,
    ) -> Self {
        Self {
            serial: serial.into(),
            started_at: Local::now(),
            nodes,
            channels,
            tolerance,
            matrix: None,
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn nodes(&self) -> &NodeList {
        &self.nodes
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    pub fn tolerance(&self) -> &ToleranceRule {
        &self.tolerance
    }

    /// Lays out one row per channel and a blank column per node.
    pub fn begin_matrix(&mut self) {
        self.matrix = Some(MatrixBuilder::initialize(&self.channels, self.nodes.len()));
    }

    pub fn completed_nodes(&self) -> usize {
        self.matrix.as_ref().map_or(0, MatrixBuilder::written_columns)
    }

    pub fn record(
        &mut self,
        column: NodeColumn,
        values: &[ClassifiedValue],
    ) -> Result<(), MatrixError> {
        self.matrix
            .as_mut()
            .ok_or(MatrixError::NotInitialized)?
            .set_column(column, values)
    }

    /// Finalizes the run. Consumes it, so a run is finalized at most once.
    pub fn complete(self) -> Result<CompletedRun, MatrixError> {
        let matrix = self.matrix.ok_or(MatrixError::NotInitialized)?.finalize()?;

        Ok(CompletedRun {
            serial: self.serial,
            started_at: self.started_at,
            finished_at: Local::now(),
            nodes: self.nodes,
            tolerance: self.tolerance,
            matrix,
        })
    }
}

/// Immutable view of a run that went through every node.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedRun {
    serial: String,
    started_at: DateTime<Local>,
    finished_at: DateTime<Local>,
    nodes: NodeList,
    tolerance: ToleranceRule,
    matrix: ResultMatrix,
}

impl CompletedRun {
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Local> {
        self.finished_at
    }

    pub fn nodes(&self) -> &NodeList {
        &self.nodes
    }

    pub fn tolerance(&self) -> &ToleranceRule {
        &self.tolerance
    }

    pub fn matrix(&self) -> &ResultMatrix {
        &self.matrix
    }
}
