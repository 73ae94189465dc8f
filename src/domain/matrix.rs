// Result matrix - One row per channel, one column per node
use super::channel::{ChannelMap, ChannelSpec};
use super::error::MatrixError;
use super::telemetry::{ClassifiedValue, ToleranceRule, Verdict};
use serde::Serialize;

pub const LEADING_COLUMNS: [&str; 3] = ["No.", "Test item", "Method"];
pub const TRAILING_COLUMNS: [&str; 2] = ["Verdict", "Description"];

/// What was observed when a node was accepted, and the references its
/// channels were classified against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeColumn {
    pub node_index: usize,
    pub target: f64,
    pub observed: f64,
    pub average_voltage: f64,
    pub average_temperature: f64,
}

impl NodeColumn {
    pub fn title(&self, tolerance: &ToleranceRule) -> String {
        format!(
            "{}({}) [expected: voltage {}±{}V; temperature {}±{}°C]",
            self.observed,
            self.target,
            self.average_voltage,
            tolerance.voltage,
            self.average_temperature,
            tolerance.temperature
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cell {
    pub value: f64,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixRow {
    /// 1-based sequence number shown in the first column.
    pub sequence: usize,
    pub channel: ChannelSpec,
    pub cells: Vec<Option<Cell>>,
    /// Rolled up over every written cell of the row.
    pub verdict: Verdict,
}

/// Fills a matrix one node column at a time.
#[derive(Debug, Clone)]
pub struct MatrixBuilder {
    columns: Vec<Option<NodeColumn>>,
    rows: Vec<MatrixRow>,
}

impl MatrixBuilder {
    pub fn initialize(channels: &ChannelMap, node_count: usize) -> Self {
        let rows = channels
            .channels()
            .iter()
            .map(|channel| MatrixRow {
                sequence: channel.index + 1,
                channel: channel.clone(),
                cells: vec![None; node_count],
                verdict: Verdict::NotApplicable,
            })
            .collect();

        Self {
            columns: vec![None; node_count],
            rows,
        }
    }

    pub fn node_count(&self) -> usize {
        self.columns.len()
    }

    pub fn written_columns(&self) -> usize {
        self.columns.iter().filter(|c| c.is_some()).count()
    }

    /// Writes the classified values of one node. Each column may be written
    /// once; `values` must hold one entry per row, in row order.
    pub fn set_column(
        &mut self,
        column: NodeColumn,
        values: &[ClassifiedValue],
    ) -> Result<(), MatrixError> {
        let index = column.node_index;
        let node_count = self.columns.len();
        let slot = self
            .columns
            .get_mut(index)
            .ok_or(MatrixError::NodeIndexOutOfRange { index, node_count })?;
        if slot.is_some() {
            return Err(MatrixError::ColumnAlreadyWritten(index));
        }
        if values.len() != self.rows.len() {
            return Err(MatrixError::RowCountMismatch {
                expected: self.rows.len(),
                actual: values.len(),
            });
        }
        if let Some(pos) = values.iter().enumerate().position(|(i, v)| v.channel_index != i) {
            return Err(MatrixError::ChannelOutOfOrder {
                row: pos,
                channel: values[pos].channel_index,
            });
        }

        *slot = Some(column);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.cells[index] = Some(Cell {
                value: value.scaled,
                verdict: value.verdict,
            });
            row.verdict = Verdict::rollup(row.cells.iter().flatten().map(|c| c.verdict));
        }

        Ok(())
    }

    /// Seals the matrix. Fails if any node column is still blank.
    pub fn finalize(self) -> Result<ResultMatrix, MatrixError> {
        let missing: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_none())
            .map(|(i, _)| i)
            .collect();
        if !missing.is_empty() {
            return Err(MatrixError::IncompleteColumns(missing));
        }

        Ok(ResultMatrix {
            columns: self.columns.into_iter().flatten().collect(),
            rows: self.rows,
        })
    }
}

/// Sealed matrix of a completed run. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultMatrix {
    columns: Vec<NodeColumn>,
    rows: Vec<MatrixRow>,
}

impl ResultMatrix {
    pub fn columns(&self) -> &[NodeColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[MatrixRow] {
        &self.rows
    }

    pub fn node_count(&self) -> usize {
        self.columns.len()
    }

    pub fn cell(&self, row: usize, node: usize) -> Option<&Cell> {
        self.rows.get(row)?.cells.get(node)?.as_ref()
    }

    /// Header line: descriptor columns, one title per node, trailing columns.
    pub fn column_titles(&self, tolerance: &ToleranceRule) -> Vec<String> {
        LEADING_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(self.columns.iter().map(|c| c.title(tolerance)))
            .chain(TRAILING_COLUMNS.iter().map(|s| s.to_string()))
            .collect()
    }
}
