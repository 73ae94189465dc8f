// Scripted telemetry port and plan fixtures shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use pack_acceptance::application::error::{PortError, ReportError};
use pack_acceptance::application::events::{EngineEvent, EventStream};
use pack_acceptance::application::plan::{PollingPolicy, TestPlan};
use pack_acceptance::application::report_sink::ReportSink;
use pack_acceptance::application::stimulus::StimulusProfile;
use pack_acceptance::application::telemetry_port::TelemetryPort;
use pack_acceptance::domain::channel::{AggregateReference, ChannelLayout};
use pack_acceptance::domain::test_run::CompletedRun;
use futures::StreamExt;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const CHANNEL_COUNT: u16 = 8;
pub const STIMULUS_REGISTERS: u16 = 4;

/// aggregate, three cells, three temperatures, one passthrough register
pub fn layout() -> ChannelLayout {
    ChannelLayout {
        start_offset: 0,
        channel_count: CHANNEL_COUNT,
        aggregate_index: 0,
        cell_count: 3,
        temperature_count: 3,
    }
}

/// Registers read alongside every aggregate value: cells average 1.067 V,
/// the third is 0.007 V off; temperatures are all 25.0 °C.
pub fn registers() -> Vec<u16> {
    vec![0, 1070, 1070, 1060, 250, 250, 250, 42]
}

pub fn plan(targets: &[f64]) -> TestPlan {
    TestPlan {
        slave_address: 1,
        node_targets: targets.to_vec(),
        layout: layout(),
        aggregate_reference: AggregateReference::ScaledCellSum,
        metadata: BTreeMap::new(),
        voltage_tolerance: 0.005,
        temperature_tolerance: 1.0,
        polling: PollingPolicy {
            poll_interval: Duration::from_secs(10),
            node_timeout: Duration::from_secs(60),
            readiness_timeout: Duration::from_secs(5),
        },
        stimulus: StimulusProfile {
            first_register: 100,
            register_count: STIMULUS_REGISTERS,
            base_value: 3200,
            step: 100,
            width: 20,
            node_pause: Duration::from_secs(10),
        },
    }
}

/// Port whose reads replay a list of aggregate readings. The last reading
/// repeats once the list runs out.
#[derive(Default)]
pub struct ScriptedPort {
    aggregates: Mutex<VecDeque<u16>>,
    last_aggregate: Mutex<u16>,
    fail_connect: bool,
    fail_writes: bool,
    fail_read_at: Option<usize>,
    short_reads: bool,
    write_delay: Duration,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl ScriptedPort {
    pub fn new(aggregates: &[u16]) -> Self {
        Self {
            aggregates: Mutex::new(aggregates.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Fail the read with this 0-based sequence number
    pub fn failing_read_at(mut self, read: usize) -> Self {
        self.fail_read_at = Some(read);
        self
    }

    pub fn short_reads(mut self) -> Self {
        self.short_reads = true;
        self
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.connects() + self.disconnects() + self.reads() + self.writes()
    }
}

#[async_trait]
impl TelemetryPort for ScriptedPort {
    async fn connect(&self) -> Result<(), PortError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(PortError::Transport("serial port busy".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PortError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, _slave: u8, _start_offset: u16, count: u16) -> Result<Vec<u16>, PortError> {
        let sequence = self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_read_at == Some(sequence) {
            return Err(PortError::Transport("CRC mismatch".to_string()));
        }

        let aggregate = {
            let mut last = self.last_aggregate.lock().unwrap();
            if let Some(next) = self.aggregates.lock().unwrap().pop_front() {
                *last = next;
            }
            *last
        };

        let mut values = registers();
        values[0] = aggregate;
        values.resize(usize::from(count), 0);
        if self.short_reads {
            values.pop();
        }
        Ok(values)
    }

    async fn write(&self, _slave: u8, _offset: u16, _value: u16) -> Result<(), PortError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
        if self.fail_writes {
            return Err(PortError::Timeout);
        }
        Ok(())
    }
}

/// Report sink that remembers what it was handed.
#[derive(Default)]
pub struct RecordingSink {
    pub fail: bool,
    pub published: Mutex<Vec<String>>,
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn publish(&self, run: &CompletedRun) -> Result<String, ReportError> {
        if self.fail {
            return Err(ReportError::MissingDirectory("/nonexistent".into()));
        }
        self.published.lock().unwrap().push(run.serial().to_string());
        Ok(format!("memory://{}", run.serial()))
    }
}

/// Drain a stream whose producers have all been dropped.
pub async fn collect_events(stream: EventStream) -> Vec<EngineEvent> {
    stream.map(|record| record.event).collect().await
}
