use crate::application::plan::{PollingPolicy, TestPlan};
use crate::application::stimulus::StimulusProfile;
use crate::domain::channel::{AggregateReference, ChannelLayout, ChannelMetadata};
use crate::domain::error::ConfigurationError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct StationConfig {
    pub device: DeviceSettings,
    pub channels: ChannelSettings,
    #[serde(default)]
    pub nodes: NodeSettings,
    pub tolerance: ToleranceSettings,
    pub polling: PollingSettings,
    pub stimulus: StimulusSettings,
    pub report: ReportSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceSettings {
    pub slave_address: u8,
    pub start_offset: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChannelSettings {
    pub channel_count: u16,
    pub aggregate_index: u16,
    pub cell_count: u16,
    pub temperature_count: u16,
    #[serde(default)]
    pub aggregate_reference: AggregateReference,
    #[serde(default)]
    pub entries: Vec<ChannelEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChannelEntry {
    pub offset: u16,
    pub label: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NodeSettings {
    #[serde(default)]
    pub targets: Vec<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ToleranceSettings {
    pub voltage: f64,
    pub temperature: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingSettings {
    pub poll_interval_secs: u64,
    pub node_timeout_secs: u64,
    #[serde(default = "default_readiness_timeout_secs")]
    pub readiness_timeout_secs: u64,
}

fn default_readiness_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct StimulusSettings {
    #[serde(default)]
    pub first_register: u16,
    pub register_count: u16,
    pub base_value: u16,
    pub step: u16,
    pub width: u16,
    pub node_pause_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportSettings {
    pub directory: String,
}

/// Load `path` (any format the config crate understands, extension optional)
/// with `PACK__SECTION__KEY` environment overrides on top.
pub fn load_station_config(path: &str) -> anyhow::Result<StationConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(
            config::Environment::with_prefix("PACK")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

impl StationConfig {
    /// Map the file structure onto a test plan. Only structural problems
    /// are caught here; the engine validates the plan's semantics.
    pub fn to_plan(&self) -> Result<TestPlan, ConfigurationError> {
        let mut metadata = BTreeMap::new();
        for entry in &self.channels.entries {
            let previous = metadata.insert(
                entry.offset,
                ChannelMetadata {
                    label: entry.label.clone(),
                    method: entry.method.clone(),
                    description: entry.description.clone(),
                },
            );
            if previous.is_some() {
                return Err(ConfigurationError::MalformedChannelMap(format!(
                    "offset {} is described more than once",
                    entry.offset
                )));
            }
        }

        if self.channels.aggregate_reference == AggregateReference::RawCellSum {
            tracing::warn!(
                "aggregate voltage is checked against the unscaled cell register sum; \
                 set channels.aggregate_reference = \"scaled-cell-sum\" to compare volts with volts"
            );
        }

        Ok(TestPlan {
            slave_address: self.device.slave_address,
            node_targets: self.nodes.targets.clone(),
            layout: ChannelLayout {
                start_offset: self.device.start_offset,
                channel_count: self.channels.channel_count,
                aggregate_index: self.channels.aggregate_index,
                cell_count: self.channels.cell_count,
                temperature_count: self.channels.temperature_count,
            },
            aggregate_reference: self.channels.aggregate_reference,
            metadata,
            voltage_tolerance: self.tolerance.voltage,
            temperature_tolerance: self.tolerance.temperature,
            polling: PollingPolicy {
                poll_interval: Duration::from_secs(self.polling.poll_interval_secs),
                node_timeout: Duration::from_secs(self.polling.node_timeout_secs),
                readiness_timeout: Duration::from_secs(self.polling.readiness_timeout_secs),
            },
            stimulus: StimulusProfile {
                first_register: self.stimulus.first_register,
                register_count: self.stimulus.register_count,
                base_value: self.stimulus.base_value,
                step: self.stimulus.step,
                width: self.stimulus.width,
                node_pause: Duration::from_secs(self.stimulus.node_pause_secs),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATION: &str = r#"
        [device]
        slave_address = 1
        start_offset = 0

        [channels]
        channel_count = 6
        aggregate_index = 1
        cell_count = 2
        temperature_count = 2
        aggregate_reference = "scaled-cell-sum"

        [[channels.entries]]
        offset = 1
        label = "Pack voltage"
        method = "Holding register 03H"

        [[channels.entries]]
        offset = 2
        label = "Cell 1"

        [nodes]
        targets = [3.4, 3.2, 3.3]

        [tolerance]
        voltage = 0.05
        temperature = 2.0

        [polling]
        poll_interval_secs = 10
        node_timeout_secs = 600

        [stimulus]
        register_count = 70
        base_value = 3200
        step = 100
        width = 20
        node_pause_secs = 10

        [report]
        directory = "reports"
    "#;

    fn parse(source: &str) -> StationConfig {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_station_config_to_plan() {
        let plan = parse(STATION).to_plan().unwrap();

        assert_eq!(plan.slave_address, 1);
        assert_eq!(plan.node_targets, vec![3.4, 3.2, 3.3]);
        assert_eq!(plan.layout.channel_count, 6);
        assert_eq!(plan.aggregate_reference, AggregateReference::ScaledCellSum);
        assert_eq!(plan.metadata[&1].label, "Pack voltage");
        assert_eq!(plan.metadata[&2].method, "");
        assert_eq!(plan.polling.node_timeout, Duration::from_secs(600));
        assert_eq!(plan.polling.readiness_timeout, Duration::from_secs(5));
        assert_eq!(plan.stimulus.first_register, 0);

        let validated = plan.validate().unwrap();
        assert_eq!(validated.nodes.targets(), vec![3.2, 3.3, 3.4]);
    }

    #[test]
    fn test_duplicate_entries_rejected() {
        let duplicated = STATION.replace("offset = 2", "offset = 1");

        assert!(matches!(
            parse(&duplicated).to_plan(),
            Err(ConfigurationError::MalformedChannelMap(_))
        ));
    }

    #[test]
    fn test_missing_nodes_section_yields_empty_plan() {
        let without_nodes = STATION.replace("targets = [3.4, 3.2, 3.3]", "");
        let plan = parse(&without_nodes).to_plan().unwrap();

        assert!(plan.node_targets.is_empty());
        assert_eq!(plan.validate(), Err(ConfigurationError::EmptyNodeList));
    }
}
