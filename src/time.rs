use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::{HarnessError, HarnessResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Fs,
    Ps,
    Ns,
    Us,
    Ms,
    Sec,
}

impl TimeUnit {
    /// Power of ten of one unit in seconds.
    pub fn scale(self) -> i8 {
        match self {
            TimeUnit::Fs => -15,
            TimeUnit::Ps => -12,
            TimeUnit::Ns => -9,
            TimeUnit::Us => -6,
            TimeUnit::Ms => -3,
            TimeUnit::Sec => 0,
        }
    }

    pub fn from_scale(scale: i8) -> Option<Self> {
        match scale {
            -15 => Some(TimeUnit::Fs),
            -12 => Some(TimeUnit::Ps),
            -9 => Some(TimeUnit::Ns),
            -6 => Some(TimeUnit::Us),
            -3 => Some(TimeUnit::Ms),
            0 => Some(TimeUnit::Sec),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Fs => "fs",
            TimeUnit::Ps => "ps",
            TimeUnit::Ns => "ns",
            TimeUnit::Us => "us",
            TimeUnit::Ms => "ms",
            TimeUnit::Sec => "sec",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fs" => Ok(TimeUnit::Fs),
            "ps" => Ok(TimeUnit::Ps),
            "ns" => Ok(TimeUnit::Ns),
            "us" => Ok(TimeUnit::Us),
            "ms" => Ok(TimeUnit::Ms),
            "s" | "sec" => Ok(TimeUnit::Sec),
            _ => Err(HarnessError::config(format!("unknown time unit '{}'", s))),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An integral amount of simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct SimDuration {
    pub value: u64,
    pub unit: TimeUnit,
}

impl SimDuration {
    pub const fn new(value: u64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    pub const fn ns(value: u64) -> Self {
        Self::new(value, TimeUnit::Ns)
    }

    pub const fn ps(value: u64) -> Self {
        Self::new(value, TimeUnit::Ps)
    }

    /// Converts to simulator steps of `10^precision` seconds.
    ///
    /// Fails instead of rounding when the duration is not a whole number of steps.
    pub fn to_steps(self, precision: i8) -> HarnessResult<u64> {
        let exp = self.unit.scale() - precision;
        if exp >= 0 {
            10u64
                .checked_pow(exp as u32)
                .and_then(|m| self.value.checked_mul(m))
                .ok_or_else(|| {
                    HarnessError::config(format!("{} overflows the simulator time range", self))
                })
        } else {
            let div = 10u64.checked_pow((-exp) as u32).unwrap_or(u64::MAX);
            if self.value % div == 0 {
                Ok(self.value / div)
            } else {
                Err(HarnessError::config(format!(
                    "can't convert {} to sim steps without rounding (sim precision: {})",
                    self,
                    TimeUnit::from_scale(precision)
                        .map(|u| u.to_string())
                        .unwrap_or_else(|| format!("1e{} s", precision))
                )))
            }
        }
    }
}

impl fmt::Display for SimDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

impl FromStr for SimDuration {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| HarnessError::config(format!("duration '{}' has no unit", s)))?;
        let (num, unit) = s.split_at(split);
        let value = num
            .parse::<u64>()
            .map_err(|_| HarnessError::config(format!("invalid duration '{}'", s)))?;
        Ok(Self::new(value, unit.trim().parse()?))
    }
}

impl TryFrom<String> for SimDuration {
    type Error = HarnessError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Like math.ldexp, but base 10. Only used for display, it does not preserve precision.
pub fn ldexp10(frac: f64, exp: i8) -> f64 {
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}

/// Converts simulator steps into `unit`, for logging.
pub fn steps_to(steps: u64, precision: i8, unit: TimeUnit) -> f64 {
    ldexp10(steps as f64, precision - unit.scale())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_exactly_or_refuses() {
        assert_eq!(SimDuration::ns(10).to_steps(-12).unwrap(), 10_000);
        assert_eq!(SimDuration::ps(1).to_steps(-12).unwrap(), 1);
        assert_eq!(SimDuration::ps(3000).to_steps(-9).unwrap(), 3);
        assert!(matches!(
            SimDuration::ps(1).to_steps(-9),
            Err(HarnessError::Config(_))
        ));
    }

    #[test]
    fn parses_durations() {
        assert_eq!("10ns".parse::<SimDuration>().unwrap(), SimDuration::ns(10));
        assert_eq!("1 ps".parse::<SimDuration>().unwrap(), SimDuration::ps(1));
        assert!("ten ns".parse::<SimDuration>().is_err());
        assert!("10".parse::<SimDuration>().is_err());
        assert!("10 parsecs".parse::<SimDuration>().is_err());
    }

    #[test]
    fn steps_to_unit() {
        assert_eq!(steps_to(35_000, -12, TimeUnit::Ns), 35.0);
    }
}
