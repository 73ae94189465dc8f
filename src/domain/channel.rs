// Channel domain model - Register offsets and the role each one plays in a report
use super::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelRole {
    AggregateVoltage,
    CellVoltage,
    Temperature,
    Other,
}

/// What the aggregate-voltage reading is checked against.
///
/// `RawCellSum` reproduces the comparison found in existing reports: the
/// millivolt-scaled aggregate is compared with the unscaled sum of the cell
/// registers. The units do not match, so this almost always yields `Fail`.
/// `ScaledCellSum` compares volts with volts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregateReference {
    #[default]
    RawCellSum,
    ScaledCellSum,
}

/// Sub-ranges of the register block, relative to `start_offset`.
///
/// The cell block directly follows the aggregate register and the
/// temperature block directly follows the cell block. Everything else is
/// `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelLayout {
    pub start_offset: u16,
    pub channel_count: u16,
    pub aggregate_index: u16,
    pub cell_count: u16,
    pub temperature_count: u16,
}

impl ChannelLayout {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let malformed = |msg: String| Err(ConfigurationError::MalformedChannelMap(msg));

        if self.channel_count == 0 {
            return malformed("channel count must be at least 1".to_string());
        }
        if u32::from(self.start_offset) + u32::from(self.channel_count) > 0x1_0000 {
            return malformed(format!(
                "{} channels starting at offset {} exceed the register address space",
                self.channel_count, self.start_offset
            ));
        }
        if self.aggregate_index >= self.channel_count {
            return malformed(format!(
                "aggregate index {} is outside the {} configured channels",
                self.aggregate_index, self.channel_count
            ));
        }
        if self.cell_count == 0 {
            return malformed("at least one cell-voltage channel is required".to_string());
        }

        let blocks_end = u32::from(self.aggregate_index)
            + 1
            + u32::from(self.cell_count)
            + u32::from(self.temperature_count);
        if blocks_end > u32::from(self.channel_count) {
            return malformed(format!(
                "cell and temperature blocks end at index {} but only {} channels are configured",
                blocks_end, self.channel_count
            ));
        }

        Ok(())
    }

    pub fn cell_range(&self) -> Range<usize> {
        let start = usize::from(self.aggregate_index) + 1;
        start..start + usize::from(self.cell_count)
    }

    pub fn temperature_range(&self) -> Range<usize> {
        let start = self.cell_range().end;
        start..start + usize::from(self.temperature_count)
    }

    /// Role of the channel at `index` (relative to `start_offset`).
    pub fn role_of(&self, index: usize) -> ChannelRole {
        if index == usize::from(self.aggregate_index) {
            ChannelRole::AggregateVoltage
        } else if self.cell_range().contains(&index) {
            ChannelRole::CellVoltage
        } else if self.temperature_range().contains(&index) {
            ChannelRole::Temperature
        } else {
            ChannelRole::Other
        }
    }
}

/// Report metadata of one register, as supplied by the station configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelMetadata {
    pub label: String,
    pub method: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSpec {
    /// Position in the register block, which is also the matrix row.
    pub index: usize,
    pub offset: u16,
    pub role: ChannelRole,
    #[serde(flatten)]
    pub metadata: ChannelMetadata,
}

/// Every channel of the register block in ascending offset order, with
/// roles resolved once from the layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelMap {
    layout: ChannelLayout,
    aggregate_reference: AggregateReference,
    channels: Vec<ChannelSpec>,
}

impl ChannelMap {
    /// Builds the map from a layout and metadata keyed by absolute offset.
    /// Offsets without metadata get blank labels.
    pub fn build(
        layout: ChannelLayout,
        aggregate_reference: AggregateReference,
        mut metadata: BTreeMap<u16, ChannelMetadata>,
    ) -> Result<Self, ConfigurationError> {
        layout.validate()?;

        let end = u32::from(layout.start_offset) + u32::from(layout.channel_count);
        if let Some(stray) = metadata
            .keys()
            .find(|offset| **offset < layout.start_offset || u32::from(**offset) >= end)
        {
            return Err(ConfigurationError::MalformedChannelMap(format!(
                "metadata for offset {} lies outside the register block {}..{}",
                stray, layout.start_offset, end
            )));
        }

        let channels = (0..usize::from(layout.channel_count))
            .map(|index| {
                // index < channel_count and start + count fits in u16 space
                let offset = layout.start_offset + index as u16;
                ChannelSpec {
                    index,
                    offset,
                    role: layout.role_of(index),
                    metadata: metadata.remove(&offset).unwrap_or_default(),
                }
            })
            .collect();

        Ok(Self {
            layout,
            aggregate_reference,
            channels,
        })
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn aggregate_reference(&self) -> AggregateReference {
        self.aggregate_reference
    }

    pub fn channels(&self) -> &[ChannelSpec] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn start_offset(&self) -> u16 {
        self.layout.start_offset
    }

    pub fn channel_count(&self) -> u16 {
        self.layout.channel_count
    }

    pub fn aggregate_index(&self) -> usize {
        usize::from(self.layout.aggregate_index)
    }
}
