// Report sink trait - Where completed runs are handed off
use crate::application::error::ReportError;
use crate::domain::test_run::CompletedRun;
use async_trait::async_trait;

#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Persist a completed run and return where it went
    async fn publish(&self, run: &CompletedRun) -> Result<String, ReportError>;
}
