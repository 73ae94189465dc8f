// Classifier - Scales a raw sample and checks every channel against tolerance
use crate::domain::channel::{AggregateReference, ChannelMap, ChannelRole};
use crate::domain::telemetry::{round_to, ClassifiedValue, TelemetrySample, ToleranceRule, Verdict};

const VOLTAGE_DIVISOR: f64 = 1000.0;
const VOLTAGE_DECIMALS: i32 = 3;
const TEMPERATURE_DIVISOR: f64 = 10.0;
const TEMPERATURE_DECIMALS: i32 = 1;

/// Sums and averages of one sample that individual channels are compared to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleReference {
    pub aggregate_voltage: f64,
    pub cell_sum_raw: u32,
    pub average_voltage: f64,
    pub average_temperature: f64,
}

impl SampleReference {
    pub fn from_sample(sample: &TelemetrySample, channels: &ChannelMap) -> Self {
        let layout = channels.layout();
        let raw = |index: usize| sample.get(index).unwrap_or(0);

        let cell_sum_raw: u32 = layout.cell_range().map(|i| u32::from(raw(i))).sum();
        let temperature_sum_raw: u32 = layout.temperature_range().map(|i| u32::from(raw(i))).sum();

        let average_voltage = round_to(
            f64::from(cell_sum_raw) / (f64::from(layout.cell_count) * VOLTAGE_DIVISOR),
            VOLTAGE_DECIMALS,
        );
        let average_temperature = if layout.temperature_count == 0 {
            0.0
        } else {
            round_to(
                f64::from(temperature_sum_raw)
                    / (f64::from(layout.temperature_count) * TEMPERATURE_DIVISOR),
                TEMPERATURE_DECIMALS,
            )
        };

        Self {
            aggregate_voltage: aggregate_voltage(sample, channels),
            cell_sum_raw,
            average_voltage,
            average_temperature,
        }
    }

    fn aggregate_target(&self, reference: AggregateReference) -> f64 {
        match reference {
            AggregateReference::RawCellSum => f64::from(self.cell_sum_raw),
            AggregateReference::ScaledCellSum => {
                round_to(f64::from(self.cell_sum_raw) / VOLTAGE_DIVISOR, VOLTAGE_DECIMALS)
            }
        }
    }
}

/// Aggregate voltage of a sample in volts, as used by the node predicate.
pub fn aggregate_voltage(sample: &TelemetrySample, channels: &ChannelMap) -> f64 {
    let raw = sample.get(channels.aggregate_index()).unwrap_or(0);
    scale_voltage(raw)
}

fn scale_voltage(raw: u16) -> f64 {
    round_to(f64::from(raw) / VOLTAGE_DIVISOR, VOLTAGE_DECIMALS)
}

fn scale_temperature(raw: u16) -> f64 {
    round_to(f64::from(raw) / TEMPERATURE_DIVISOR, TEMPERATURE_DECIMALS)
}

/// Classify every channel of `sample`, in channel order.
///
/// Deviations are rounded to the channel's precision before they are
/// compared with the tolerance.
pub fn classify(
    sample: &TelemetrySample,
    channels: &ChannelMap,
    reference: &SampleReference,
    tolerance: &ToleranceRule,
) -> Vec<ClassifiedValue> {
    channels
        .channels()
        .iter()
        .map(|channel| {
            let raw = sample.get(channel.index).unwrap_or(0);
            let (scaled, verdict) = match channel.role {
                ChannelRole::AggregateVoltage => {
                    let scaled = scale_voltage(raw);
                    let target = reference.aggregate_target(channels.aggregate_reference());
                    let deviation = round_to((scaled - target).abs(), VOLTAGE_DECIMALS);
                    (scaled, Verdict::within(deviation, tolerance.voltage))
                }
                ChannelRole::CellVoltage => {
                    let scaled = scale_voltage(raw);
                    let deviation =
                        round_to((scaled - reference.average_voltage).abs(), VOLTAGE_DECIMALS);
                    (scaled, Verdict::within(deviation, tolerance.voltage))
                }
                ChannelRole::Temperature => {
                    let scaled = scale_temperature(raw);
                    let deviation = round_to(
                        (scaled - reference.average_temperature).abs(),
                        TEMPERATURE_DECIMALS,
                    );
                    (scaled, Verdict::within(deviation, tolerance.temperature))
                }
                ChannelRole::Other => (f64::from(raw), Verdict::NotApplicable),
            };

            ClassifiedValue {
                channel_index: channel.index,
                offset: channel.offset,
                role: channel.role,
                scaled,
                verdict,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::channel::ChannelLayout;
    use std::collections::BTreeMap;
    use Verdict::*;

    // aggregate, three cells, three temperatures, one passthrough register
    fn channels(reference: AggregateReference) -> ChannelMap {
        let layout = ChannelLayout {
            start_offset: 0,
            channel_count: 8,
            aggregate_index: 0,
            cell_count: 3,
            temperature_count: 3,
        };
        ChannelMap::build(layout, reference, BTreeMap::new()).unwrap()
    }

    fn verdicts(values: &[ClassifiedValue], role: ChannelRole) -> Vec<Verdict> {
        values.iter().filter(|v| v.role == role).map(|v| v.verdict).collect()
    }

    fn scaled(values: &[ClassifiedValue], role: ChannelRole) -> Vec<f64> {
        values.iter().filter(|v| v.role == role).map(|v| v.scaled).collect()
    }

    fn run(registers: Vec<u16>, map: &ChannelMap, tolerance: ToleranceRule) -> Vec<ClassifiedValue> {
        let sample = TelemetrySample::new(registers);
        let reference = SampleReference::from_sample(&sample, map);
        classify(&sample, map, &reference, &tolerance)
    }

    #[test]
    fn test_cell_voltages_against_average() {
        let map = channels(AggregateReference::ScaledCellSum);
        let sample = TelemetrySample::new(vec![600, 200, 210, 190, 250, 250, 250, 7]);
        let reference = SampleReference::from_sample(&sample, &map);

        assert_eq!(reference.cell_sum_raw, 600);
        assert_eq!(reference.average_voltage, 0.2);

        let loose = classify(&sample, &map, &reference, &ToleranceRule::new(0.05, 1.0).unwrap());
        assert_eq!(scaled(&loose, ChannelRole::CellVoltage), vec![0.2, 0.21, 0.19]);
        assert_eq!(verdicts(&loose, ChannelRole::CellVoltage), vec![Pass, Pass, Pass]);

        // both outer cells deviate by 0.010
        let tight = classify(&sample, &map, &reference, &ToleranceRule::new(0.005, 1.0).unwrap());
        assert_eq!(verdicts(&tight, ChannelRole::CellVoltage), vec![Pass, Fail, Fail]);
    }

    #[test]
    fn test_single_outlier_cell_fails() {
        let map = channels(AggregateReference::ScaledCellSum);
        let values = run(
            vec![610, 200, 210, 200, 250, 250, 250, 0],
            &map,
            ToleranceRule::new(0.005, 1.0).unwrap(),
        );

        // average 0.203
        assert_eq!(verdicts(&values, ChannelRole::CellVoltage), vec![Pass, Fail, Pass]);
    }

    #[test]
    fn test_deviation_equal_to_tolerance_passes() {
        let map = channels(AggregateReference::ScaledCellSum);
        let values = run(
            vec![600, 200, 210, 190, 250, 250, 250, 0],
            &map,
            ToleranceRule::new(0.01, 1.0).unwrap(),
        );

        assert_eq!(verdicts(&values, ChannelRole::CellVoltage), vec![Pass, Pass, Pass]);
    }

    #[test]
    fn test_temperatures_against_average() {
        let map = channels(AggregateReference::ScaledCellSum);
        let values = run(
            vec![600, 200, 200, 200, 250, 262, 238, 0],
            &map,
            ToleranceRule::new(0.05, 1.0).unwrap(),
        );

        assert_eq!(scaled(&values, ChannelRole::Temperature), vec![25.0, 26.2, 23.8]);
        assert_eq!(verdicts(&values, ChannelRole::Temperature), vec![Pass, Fail, Fail]);
    }

    #[test]
    fn test_other_channels_pass_through() {
        let map = channels(AggregateReference::ScaledCellSum);
        let values = run(
            vec![600, 200, 200, 200, 250, 250, 250, 4242],
            &map,
            ToleranceRule::new(0.05, 1.0).unwrap(),
        );

        assert_eq!(values[7].role, ChannelRole::Other);
        assert_eq!(values[7].scaled, 4242.0);
        assert_eq!(values[7].verdict, NotApplicable);
    }

    #[test]
    fn test_aggregate_reference_modes() {
        let registers = vec![600, 200, 200, 200, 250, 250, 250, 0];
        let tolerance = ToleranceRule::new(0.05, 1.0).unwrap();

        let scaled_sum = run(registers.clone(), &channels(AggregateReference::ScaledCellSum), tolerance);
        assert_eq!(scaled_sum[0].scaled, 0.6);
        assert_eq!(scaled_sum[0].verdict, Pass);

        // 0.6 V compared against 600
        let raw_sum = run(registers, &channels(AggregateReference::RawCellSum), tolerance);
        assert_eq!(raw_sum[0].scaled, 0.6);
        assert_eq!(raw_sum[0].verdict, Fail);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let map = channels(AggregateReference::RawCellSum);
        let sample = TelemetrySample::new(vec![3300, 1100, 1090, 1110, 251, 249, 250, 9]);
        let reference = SampleReference::from_sample(&sample, &map);
        let tolerance = ToleranceRule::new(0.005, 0.5).unwrap();

        let first = classify(&sample, &map, &reference, &tolerance);
        let second = classify(&sample, &map, &reference, &tolerance);

        assert_eq!(first, second);
        assert_eq!(reference, SampleReference::from_sample(&sample, &map));
    }

    #[test]
    fn test_aggregate_voltage_is_scaled_to_volts() {
        let map = channels(AggregateReference::RawCellSum);
        let sample = TelemetrySample::new(vec![3200, 0, 0, 0, 0, 0, 0, 0]);

        assert_eq!(aggregate_voltage(&sample, &map), 3.2);
    }
}
