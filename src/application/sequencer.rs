// Acquisition sequencer - Walks the node sequence, polling telemetry until each target is reached
use crate::application::cancel::{cancel_pair, CancelSignal};
use crate::application::classifier::{aggregate_voltage, classify, SampleReference};
use crate::application::error::{AbortReason, EngineError, PortError};
use crate::application::events::{EngineEvent, EventSink, RunStatus};
use crate::application::plan::{TestPlan, ValidatedPlan};
use crate::application::stimulus::StimulusDriver;
use crate::application::telemetry_port::TelemetryPort;
use crate::domain::matrix::NodeColumn;
use crate::domain::node::Node;
use crate::domain::telemetry::TelemetrySample;
use crate::domain::test_run::{CompletedRun, TestRun};
use chrono::Local;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;

pub struct AcquisitionSequencer {
    port: Arc<dyn TelemetryPort>,
    events: EventSink,
    stimulus_seed: Option<u64>,
}

impl AcquisitionSequencer {
    pub fn new(port: Arc<dyn TelemetryPort>, events: EventSink) -> Self {
        Self {
            port,
            events,
            stimulus_seed: None,
        }
    }

    /// Makes the stimulus values reproducible.
    pub fn with_stimulus_seed(mut self, seed: u64) -> Self {
        self.stimulus_seed = Some(seed);
        self
    }

    /// Runs the whole node sequence for one unit.
    ///
    /// The plan is validated before the port is touched. The stimulus driver
    /// runs alongside acquisition and is stopped when the run ends, whatever
    /// the outcome. Every outcome is reported once as `RunFinished`, except
    /// configuration and connection errors, which happen before the run
    /// starts.
    pub async fn run(
        &self,
        serial: &str,
        plan: &TestPlan,
        mut cancel: CancelSignal,
    ) -> Result<CompletedRun, EngineError> {
        let plan = plan.validate()?;

        if let Err(error) = self.port.connect().await {
            self.events.emit(EngineEvent::ConnectionFailed {
                error: error.clone(),
            });
            return Err(EngineError::Connection(error));
        }
        self.events.emit(EngineEvent::Connected);

        let mut run = TestRun::start(
            serial,
            plan.nodes.clone(),
            plan.channels.clone(),
            plan.tolerance,
        );
        self.events.emit(EngineEvent::RunStarted {
            serial: serial.to_string(),
            node_count: plan.nodes.len(),
        });

        let (stop_stimulus, stimulus_signal) = cancel_pair();
        let (ready_tx, ready_rx) = oneshot::channel();
        let mut driver = StimulusDriver::new(
            self.port.clone(),
            plan.slave_address,
            plan.stimulus,
            plan.nodes.len(),
            self.events.clone(),
        );
        if let Some(seed) = self.stimulus_seed {
            driver = driver.with_seed(seed);
        }
        let stimulus = tokio::spawn(driver.run(ready_tx, stimulus_signal));

        let acquired = self.acquire(&mut run, &plan, ready_rx, &mut cancel).await;

        stop_stimulus.cancel();
        match stimulus.await {
            Ok(report) => tracing::debug!(
                "stimulus stopped after {} writes ({} failed)",
                report.writes,
                report.faults
            ),
            Err(e) => tracing::warn!("stimulus task ended abnormally: {}", e),
        }

        if let Err(e) = self.port.disconnect().await {
            tracing::warn!("failed to disconnect from pack controller: {}", e);
        }

        let outcome = acquired.and_then(|()| {
            let node_index = run.completed_nodes();
            run.complete()
                .map_err(|source| AbortReason::Matrix { node_index, source })
        });

        match outcome {
            Ok(completed) => {
                self.events.emit(EngineEvent::RunFinished(RunStatus::Completed));
                Ok(completed)
            }
            Err(reason) => {
                self.events
                    .emit(EngineEvent::RunFinished(RunStatus::Aborted(reason.clone())));
                Err(EngineError::Aborted(reason))
            }
        }
    }

    async fn acquire(
        &self,
        run: &mut TestRun,
        plan: &ValidatedPlan,
        ready: oneshot::Receiver<()>,
        cancel: &mut CancelSignal,
    ) -> Result<(), AbortReason> {
        let waited = plan.polling.readiness_timeout;
        tokio::select! {
            signal = tokio::time::timeout(waited, ready) => match signal {
                Ok(Ok(())) => self.events.emit(EngineEvent::StimulusReady),
                _ => self.events.emit(EngineEvent::StimulusNotReady { waited }),
            },
            _ = cancel.cancelled() => return Err(AbortReason::Cancelled { node_index: 0 }),
        }

        run.begin_matrix();

        for node in plan.nodes.iter() {
            let (sample, observed) = self.await_node(node, plan, cancel).await?;

            let reference = SampleReference::from_sample(&sample, &plan.channels);
            let values = classify(&sample, &plan.channels, &reference, &plan.tolerance);
            let column = NodeColumn {
                node_index: node.index,
                target: node.target,
                observed,
                average_voltage: reference.average_voltage,
                average_temperature: reference.average_temperature,
            };
            run.record(column, &values)
                .map_err(|source| AbortReason::Matrix {
                    node_index: node.index,
                    source,
                })?;

            self.events.emit(EngineEvent::ColumnWritten {
                node_index: node.index,
            });
        }

        Ok(())
    }

    /// Polls until the node's predicate holds and returns the accepted
    /// sample with its aggregate voltage.
    async fn await_node(
        &self,
        node: &Node,
        plan: &ValidatedPlan,
        cancel: &mut CancelSignal,
    ) -> Result<(TelemetrySample, f64), AbortReason> {
        let node_index = node.index;
        let timeout = plan.polling.node_timeout;
        let deadline = Instant::now().checked_add(timeout);
        let wall_deadline = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|d| Local::now().checked_add_signed(d))
            .unwrap_or_else(Local::now);

        self.events.emit(EngineEvent::NodeStarted {
            node_index,
            target: node.target,
        });

        loop {
            let sample = tokio::select! {
                read = self.read_sample(plan) => read
                    .map_err(|source| AbortReason::Telemetry { node_index, source })?,
                _ = cancel.cancelled() => return Err(AbortReason::Cancelled { node_index }),
            };

            let observed = aggregate_voltage(&sample, &plan.channels);
            if node.is_reached_by(observed) {
                self.events.emit(EngineEvent::NodeReached {
                    node_index,
                    observed,
                    target: node.target,
                });
                return Ok((sample, observed));
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(AbortReason::NodeTimeout {
                    node_index,
                    last_observed: observed,
                });
            }

            self.events.emit(EngineEvent::Waiting {
                node_index,
                observed,
                target: node.target,
                deadline: wall_deadline,
            });

            tokio::select! {
                _ = tokio::time::sleep(plan.polling.poll_interval) => {}
                _ = cancel.cancelled() => return Err(AbortReason::Cancelled { node_index }),
            }
        }
    }

    async fn read_sample(&self, plan: &ValidatedPlan) -> Result<TelemetrySample, PortError> {
        let count = plan.channels.channel_count();
        let registers = self
            .port
            .read(plan.slave_address, plan.channels.start_offset(), count)
            .await?;

        if registers.len() != usize::from(count) {
            return Err(PortError::ShortRead {
                expected: usize::from(count),
                actual: registers.len(),
            });
        }

        Ok(TelemetrySample::new(registers))
    }
}
