// Telemetry domain models - Raw samples, tolerances and verdicts

use super::channel::ChannelRole;
use super::error::ConfigurationError;
use serde::Serialize;
use std::fmt;

/// Rounds half away from zero to `decimals` places.
///
/// Every scaled value, average and deviation in a run goes through here so
/// the whole matrix shares one rounding rule.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Register values captured by a single read, indexed from the configured
/// start offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetrySample {
    registers: Vec<u16>,
}

impl TelemetrySample {
    pub fn new(registers: Vec<u16>) -> Self {
        Self { registers }
    }

    pub fn get(&self, index: usize) -> Option<u16> {
        self.registers.get(index).copied()
    }

    pub fn registers(&self) -> &[u16] {
        &self.registers
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

/// Allowed deviation from the per-sample average, in volts and degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToleranceRule {
    pub voltage: f64,
    pub temperature: f64,
}

impl ToleranceRule {
    pub fn new(voltage: f64, temperature: f64) -> Result<Self, ConfigurationError> {
        for (name, value) in [("voltage", voltage), ("temperature", temperature)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidTolerance { name, value });
            }
        }
        Ok(Self {
            voltage,
            temperature,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Verdict {
    Pass,
    Fail,
    NotApplicable,
}

impl Verdict {
    pub fn within(deviation: f64, tolerance: f64) -> Self {
        if deviation <= tolerance {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    /// Combines per-node verdicts of one channel: any failure fails the
    /// channel, otherwise one pass is enough.
    pub fn rollup<I: IntoIterator<Item = Verdict>>(verdicts: I) -> Self {
        verdicts
            .into_iter()
            .fold(Verdict::NotApplicable, |acc, v| match (acc, v) {
                (Verdict::Fail, _) | (_, Verdict::Fail) => Verdict::Fail,
                (Verdict::Pass, _) | (_, Verdict::Pass) => Verdict::Pass,
                _ => Verdict::NotApplicable,
            })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "Pass"),
            Verdict::Fail => write!(f, "Fail"),
            Verdict::NotApplicable => write!(f, "N/A"),
        }
    }
}

/// One channel of one sample after scaling and tolerance checking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassifiedValue {
    pub channel_index: usize,
    pub offset: u16,
    pub role: ChannelRole,
    pub scaled: f64,
    pub verdict: Verdict,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_to(0.2106, 3), 0.211);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(32.25, 1), 32.3);
        assert_eq!(round_to(-1.25, 1), -1.3);
        assert_eq!(round_to(3.2, 3), 3.2);
    }

    #[test]
    fn test_tolerance_rejects_negative_and_nan() {
        assert!(ToleranceRule::new(0.05, 2.0).is_ok());
        assert!(ToleranceRule::new(0.0, 0.0).is_ok());
        assert_eq!(
            ToleranceRule::new(-0.1, 2.0),
            Err(ConfigurationError::InvalidTolerance {
                name: "voltage",
                value: -0.1
            })
        );
        assert!(ToleranceRule::new(0.05, f64::NAN).is_err());
    }

    #[test]
    fn test_verdict_rollup() {
        use Verdict::*;

        assert_eq!(Verdict::rollup([Pass, Pass]), Pass);
        assert_eq!(Verdict::rollup([Pass, Fail, Pass]), Fail);
        assert_eq!(Verdict::rollup([NotApplicable, Pass]), Pass);
        assert_eq!(Verdict::rollup([NotApplicable]), NotApplicable);
        assert_eq!(Verdict::rollup(Vec::new()), NotApplicable);
    }

    #[test]
    fn test_sample_is_indexed_from_start() {
        let sample = TelemetrySample::new(vec![1, 2, 3]);

        assert_eq!(sample.get(0), Some(1));
        assert_eq!(sample.get(3), None);
        assert_eq!(sample.len(), 3);
    }
}
