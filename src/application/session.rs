// Test session - Use case for testing one unit: run the sequence, then publish the report
use crate::application::cancel::CancelSignal;
use crate::application::error::SessionError;
use crate::application::events::{EngineEvent, EventSink};
use crate::application::plan::TestPlan;
use crate::application::report_sink::ReportSink;
use crate::application::sequencer::AcquisitionSequencer;
use crate::application::telemetry_port::TelemetryPort;
use crate::domain::test_run::CompletedRun;
use std::sync::Arc;

#[derive(Debug)]
pub struct SessionReport {
    pub run: CompletedRun,
    pub location: String,
}

#[derive(Clone)]
pub struct TestSession {
    port: Arc<dyn TelemetryPort>,
    reports: Arc<dyn ReportSink>,
    plan: TestPlan,
    events: EventSink,
    stimulus_seed: Option<u64>,
}

impl TestSession {
    pub fn new(
        port: Arc<dyn TelemetryPort>,
        reports: Arc<dyn ReportSink>,
        plan: TestPlan,
        events: EventSink,
    ) -> Self {
        Self {
            port,
            reports,
            plan,
            events,
            stimulus_seed: None,
        }
    }

    pub fn with_stimulus_seed(mut self, seed: u64) -> Self {
        self.stimulus_seed = Some(seed);
        self
    }

    /// Only completed runs reach the report sink.
    pub async fn execute(
        &self,
        serial: &str,
        cancel: CancelSignal,
    ) -> Result<SessionReport, SessionError> {
        let mut sequencer = AcquisitionSequencer::new(self.port.clone(), self.events.clone());
        if let Some(seed) = self.stimulus_seed {
            sequencer = sequencer.with_stimulus_seed(seed);
        }

        let run = sequencer.run(serial, &self.plan, cancel).await?;

        match self.reports.publish(&run).await {
            Ok(location) => {
                self.events.emit(EngineEvent::ReportPublished {
                    location: location.clone(),
                });
                Ok(SessionReport { run, location })
            }
            Err(e) => {
                self.events.emit(EngineEvent::ReportFailed {
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }
}
