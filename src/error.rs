//! Error taxonomy of a verification run.
//!
//! Every variant is fatal to the run it occurs in. Nothing here is retried:
//! the first error recorded through [`crate::fail_test`] is the verdict.

use std::fmt;

use crate::value::BinaryValue;

#[derive(Debug, Clone, thiserror::Error)]
pub enum HarnessError {
    /// Rejected before the run starts: bad widths, inconsistent time units,
    /// incomplete transition tables, malformed configuration files.
    #[error("configuration error: {0}")]
    Config(String),

    /// The signal interface refused a lookup, read or write.
    #[error("signal {signal}: {reason}")]
    Signal { signal: String, reason: String },

    /// Predicted and observed output differ.
    #[error("{0}")]
    Mismatch(Box<MismatchReport>),

    /// The simulator stopped delivering events while the test was still pending.
    #[error("simulation stalled at {time_ps} ps: {reason}")]
    Stalled { time_ps: u64, reason: String },

    /// The run ended without a single comparison.
    #[error("no checks were performed")]
    NoChecks,

    /// A task or channel endpoint went away before handing over its result.
    #[error("task '{task}' was cancelled")]
    Cancelled { task: String },

    #[error("report error: {0}")]
    Report(String),
}

impl HarnessError {
    pub fn config(msg: impl Into<String>) -> Self {
        HarnessError::Config(msg.into())
    }

    pub fn signal(signal: impl Into<String>, reason: impl Into<String>) -> Self {
        HarnessError::Signal {
            signal: signal.into(),
            reason: reason.into(),
        }
    }

    pub fn mismatch(&self) -> Option<&MismatchReport> {
        match self {
            HarnessError::Mismatch(report) => Some(report),
            _ => None,
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Everything needed to replay a failed comparison by hand.
#[derive(Debug, Clone, PartialEq)]
pub struct MismatchReport {
    pub cycle: u64,
    pub time_ps: u64,
    pub signal: String,
    pub inputs: Vec<(String, BinaryValue)>,
    pub expected: BinaryValue,
    pub observed: BinaryValue,
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mismatch at cycle {} ({} ps): {} is {} and should be {}",
            self.cycle, self.time_ps, self.signal, self.observed, self.expected
        )?;
        if !self.inputs.is_empty() {
            write!(f, " [inputs:")?;
            for (name, value) in &self.inputs {
                write!(f, " {}={}", name, value)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_message_names_cycle_inputs_and_values() {
        let report = MismatchReport {
            cycle: 17,
            time_ps: 170_000,
            signal: "top.outpt".to_string(),
            inputs: vec![
                ("rst".to_string(), BinaryValue::bit(false)),
                ("inpt".to_string(), BinaryValue::bit(true)),
            ],
            expected: BinaryValue::bit(true),
            observed: BinaryValue::bit(false),
        };
        let msg = HarnessError::Mismatch(Box::new(report)).to_string();
        assert!(msg.contains("cycle 17"));
        assert!(msg.contains("rst=1'b0"));
        assert!(msg.contains("inpt=1'b1"));
        assert!(msg.contains("is 1'b0 and should be 1'b1"));
    }
}
