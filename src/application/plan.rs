// Test plan - Everything a run needs, checked once before the pack is touched
use crate::application::stimulus::StimulusProfile;
use crate::domain::channel::{AggregateReference, ChannelLayout, ChannelMap, ChannelMetadata};
use crate::domain::error::ConfigurationError;
use crate::domain::node::NodeList;
use crate::domain::telemetry::ToleranceRule;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingPolicy {
    pub poll_interval: Duration,
    pub node_timeout: Duration,
    /// How long to wait for the stimulus driver's first burst.
    pub readiness_timeout: Duration,
}

impl PollingPolicy {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigurationError::InvalidPolling(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.node_timeout.is_zero() {
            return Err(ConfigurationError::InvalidPolling(
                "node timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Plan as configured, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct TestPlan {
    pub slave_address: u8,
    pub node_targets: Vec<f64>,
    pub layout: ChannelLayout,
    pub aggregate_reference: AggregateReference,
    pub metadata: BTreeMap<u16, ChannelMetadata>,
    pub voltage_tolerance: f64,
    pub temperature_tolerance: f64,
    pub polling: PollingPolicy,
    pub stimulus: StimulusProfile,
}

/// Plan whose invariants hold: ascending non-empty nodes, roles resolved,
/// non-negative tolerances.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlan {
    pub slave_address: u8,
    pub nodes: NodeList,
    pub channels: ChannelMap,
    pub tolerance: ToleranceRule,
    pub polling: PollingPolicy,
    pub stimulus: StimulusProfile,
}

impl TestPlan {
    pub fn validate(&self) -> Result<ValidatedPlan, ConfigurationError> {
        let nodes = NodeList::new(&self.node_targets)?;
        let channels =
            ChannelMap::build(self.layout, self.aggregate_reference, self.metadata.clone())?;
        let tolerance = ToleranceRule::new(self.voltage_tolerance, self.temperature_tolerance)?;
        self.polling.validate()?;
        self.stimulus.validate(nodes.len())?;

        Ok(ValidatedPlan {
            slave_address: self.slave_address,
            nodes,
            channels,
            tolerance,
            polling: self.polling,
            stimulus: self.stimulus,
        })
    }
}
