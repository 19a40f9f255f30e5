//! Run configuration.
//!
//! All timing values share one time base: they are converted to simulator
//! steps before the run starts, and the number of checked cycles is derived
//! with integer division so there is never a fractional cycle.

use serde::Deserialize;

use crate::time::SimDuration;
use crate::{HarnessError, HarnessResult};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub clock_period: SimDuration,
    /// Need not be a multiple of the clock period.
    pub reset_time: SimDuration,
    pub settle: SimDuration,
    pub test_duration: SimDuration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            clock_period: SimDuration::ns(10),
            reset_time: SimDuration::ns(35),
            settle: SimDuration::ps(1),
            test_duration: SimDuration::ns(1000),
        }
    }
}

/// Timing in simulator steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub period: u64,
    pub reset: u64,
    pub settle: u64,
    pub duration: u64,
}

impl Timing {
    pub fn cycles(&self) -> u64 {
        self.duration / self.period
    }
}

impl TimingConfig {
    pub fn resolve(&self, precision: i8) -> HarnessResult<Timing> {
        let timing = Timing {
            period: self.clock_period.to_steps(precision)?,
            reset: self.reset_time.to_steps(precision)?,
            settle: self.settle.to_steps(precision)?,
            duration: self.test_duration.to_steps(precision)?,
        };
        if timing.period < 2 {
            return Err(HarnessError::config(format!(
                "clock period {} is shorter than two simulator steps",
                self.clock_period
            )));
        }
        if timing.period % 2 != 0 {
            tracing::warn!(
                period = %self.clock_period,
                "clock period not dividable by 2, high and low time will differ"
            );
        }
        if timing.duration % timing.period != 0 {
            tracing::warn!(
                duration = %self.test_duration,
                period = %self.clock_period,
                cycles = timing.cycles(),
                "test duration is not a whole number of periods, rounding down"
            );
        }
        Ok(timing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLength {
    /// Bounded generator: stop after this many sequence items.
    Items(u64),
    /// Unbounded generator: stop after `test_duration / clock_period` cycles.
    Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub timing: TimingConfig,
    pub seed: u64,
    pub length: RunLength,
    /// Capacity of the monitor to predictor queue.
    pub channel_depth: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            seed: 0x5eed,
            length: RunLength::Duration,
            channel_depth: 4,
        }
    }
}

impl HarnessConfig {
    pub fn from_toml_str(s: &str) -> HarnessResult<Self> {
        let config: HarnessConfig =
            toml::from_str(s).map_err(|e| HarnessError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.channel_depth == 0 {
            return Err(HarnessError::config("channel depth must be at least 1"));
        }
        if let RunLength::Items(0) = self.length {
            return Err(HarnessError::config("item count must be at least 1"));
        }
        Ok(())
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_length(mut self, length: RunLength) -> Self {
        self.length = length;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_use_integer_division() {
        let timing = TimingConfig {
            test_duration: SimDuration::ns(1005),
            ..TimingConfig::default()
        }
        .resolve(-12)
        .unwrap();
        assert_eq!(timing.period, 10_000);
        assert_eq!(timing.cycles(), 100);
    }

    #[test]
    fn settle_below_precision_is_a_config_error() {
        let err = TimingConfig::default().resolve(-9).unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn loads_from_toml() {
        let config = HarnessConfig::from_toml_str(
            r#"
            seed = 7
            length = { items = 100 }

            [timing]
            clock_period = "10ns"
            reset_time = "35ns"
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.length, RunLength::Items(100));
        assert_eq!(config.timing.settle, SimDuration::ps(1));
        assert_eq!(config.channel_depth, 4);
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(HarnessConfig::from_toml_str("seed = \"x\"").is_err());
        assert!(HarnessConfig::from_toml_str("[timing]\nclock_period = \"10 parsecs\"").is_err());
        assert!(HarnessConfig::from_toml_str("length = { items = 0 }").is_err());
    }
}
