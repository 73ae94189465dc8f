// JSON report writer - Persists completed runs, one file per unit
use crate::application::error::ReportError;
use crate::application::report_sink::ReportSink;
use crate::domain::matrix::ResultMatrix;
use crate::domain::test_run::CompletedRun;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    serial: &'a str,
    tested_at: String,
    finished_at: String,
    /// Rendered table, header first, the way an operator reads it.
    table: Vec<Vec<Value>>,
    matrix: &'a ResultMatrix,
}

#[derive(Debug, Clone)]
pub struct JsonReportWriter {
    directory: PathBuf,
}

impl JsonReportWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// `SN_{serial}_{start time}.json`, with path separators in the serial
    /// replaced.
    pub fn file_name(run: &CompletedRun) -> String {
        let serial: String = run
            .serial()
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        format!(
            "SN_{}_{}.json",
            serial,
            run.started_at().format("%Y-%m-%d-%H-%M-%S")
        )
    }

    fn table(run: &CompletedRun) -> Vec<Vec<Value>> {
        let matrix = run.matrix();
        let header: Vec<Value> = matrix
            .column_titles(run.tolerance())
            .into_iter()
            .map(Value::String)
            .collect();

        let rows = matrix.rows().iter().map(|row| {
            let mut line = vec![
                json!(row.sequence),
                json!(row.channel.metadata.label),
                json!(row.channel.metadata.method),
            ];
            line.extend(
                row.cells
                    .iter()
                    .map(|cell| cell.map_or(Value::Null, |c| json!(c.value))),
            );
            line.push(json!(row.verdict.to_string()));
            line.push(json!(row.channel.metadata.description));
            line
        });

        std::iter::once(header).chain(rows).collect()
    }

    async fn ensure_directory(directory: &Path) -> Result<(), ReportError> {
        match tokio::fs::metadata(directory).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(ReportError::MissingDirectory(directory.to_path_buf())),
        }
    }
}

#[async_trait]
impl ReportSink for JsonReportWriter {
    async fn publish(&self, run: &CompletedRun) -> Result<String, ReportError> {
        Self::ensure_directory(&self.directory).await?;

        let document = ReportDocument {
            serial: run.serial(),
            tested_at: run.started_at().format("%Y-%m-%d %H:%M:%S").to_string(),
            finished_at: run.finished_at().format("%Y-%m-%d %H:%M:%S").to_string(),
            table: Self::table(run),
            matrix: run.matrix(),
        };
        let encoded = serde_json::to_vec_pretty(&document)?;

        let path = self.directory.join(Self::file_name(run));
        tokio::fs::write(&path, encoded).await?;
        tracing::info!("wrote report {}", path.display());

        Ok(path.display().to_string())
    }
}
