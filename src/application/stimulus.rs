// Stimulus driver - Background task that writes simulated charge-ramp values to the pack
use crate::application::cancel::CancelSignal;
use crate::application::events::{EngineEvent, EventSink};
use crate::application::telemetry_port::TelemetryPort;
use crate::domain::error::ConfigurationError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Shape of the ramp written for each node.
///
/// Node `i` draws every value from `base_value + i * step ..= base_value +
/// i * step + width`, one value per register of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StimulusProfile {
    pub first_register: u16,
    pub register_count: u16,
    pub base_value: u16,
    pub step: u16,
    pub width: u16,
    pub node_pause: Duration,
}

impl StimulusProfile {
    pub fn validate(&self, node_count: usize) -> Result<(), ConfigurationError> {
        if self.register_count == 0 {
            return Err(ConfigurationError::InvalidStimulus(
                "register count must be at least 1".to_string(),
            ));
        }
        if u32::from(self.first_register) + u32::from(self.register_count) > 0x1_0000 {
            return Err(ConfigurationError::InvalidStimulus(format!(
                "{} registers starting at {} exceed the register address space",
                self.register_count, self.first_register
            )));
        }

        let last_node = node_count.saturating_sub(1) as u64;
        let highest =
            u64::from(self.base_value) + last_node * u64::from(self.step) + u64::from(self.width);
        if highest > u64::from(u16::MAX) {
            return Err(ConfigurationError::InvalidStimulus(format!(
                "ramp for {} nodes reaches {}, above the register maximum",
                node_count, highest
            )));
        }

        Ok(())
    }

    /// Value range of one node. Saturates if the profile was not validated
    /// for this many nodes.
    pub fn range_for(&self, node_index: usize) -> RangeInclusive<u16> {
        let offset = u16::try_from(node_index)
            .unwrap_or(u16::MAX)
            .saturating_mul(self.step);
        let low = self.base_value.saturating_add(offset);
        low..=low.saturating_add(self.width)
    }

    pub fn registers(&self) -> impl Iterator<Item = u16> {
        let first = u32::from(self.first_register);
        (first..first + u32::from(self.register_count)).filter_map(|r| u16::try_from(r).ok())
    }
}

/// Totals of one driver run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StimulusReport {
    pub writes: usize,
    pub faults: usize,
    pub cancelled: bool,
}

pub struct StimulusDriver {
    port: Arc<dyn TelemetryPort>,
    slave: u8,
    profile: StimulusProfile,
    node_count: usize,
    events: EventSink,
    rng: StdRng,
}

impl StimulusDriver {
    pub fn new(
        port: Arc<dyn TelemetryPort>,
        slave: u8,
        profile: StimulusProfile,
        node_count: usize,
        events: EventSink,
    ) -> Self {
        Self {
            port,
            slave,
            profile,
            node_count,
            events,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Writes one burst per node, pausing between nodes.
    ///
    /// `ready` fires once the first burst has been issued, whether or not
    /// its writes succeeded. Write failures are reported as events and never
    /// stop the driver.
    pub async fn run(mut self, ready: oneshot::Sender<()>, mut cancel: CancelSignal) -> StimulusReport {
        let mut ready = Some(ready);
        let mut report = StimulusReport::default();

        for node_index in 0..self.node_count {
            let range = self.profile.range_for(node_index);
            self.events.emit(EngineEvent::StimulusBurst {
                node_index,
                low: *range.start(),
                high: *range.end(),
            });

            for offset in self.profile.registers() {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    return report;
                }

                let value = self.rng.gen_range(range.clone());
                report.writes += 1;
                let written = tokio::select! {
                    written = self.port.write(self.slave, offset, value) => written,
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        return report;
                    }
                };
                if let Err(error) = written {
                    report.faults += 1;
                    self.events.emit(EngineEvent::StimulusFault {
                        node_index,
                        offset,
                        error,
                    });
                }
            }

            if let Some(tx) = ready.take() {
                // the sequencer may have stopped waiting
                let _ = tx.send(());
            }

            if node_index + 1 < self.node_count {
                tokio::select! {
                    _ = tokio::time::sleep(self.profile.node_pause) => {}
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        return report;
                    }
                }
            }
        }

        self.events.emit(EngineEvent::StimulusFinished {
            writes: report.writes,
            faults: report.faults,
        });
        report
    }
}
