use crate::error::MismatchReport;
use crate::monitor::ObservationRecord;
use crate::prelude::*;

/// One comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValuePair {
    pub expected: BinaryValue,
    pub observed: BinaryValue,
    pub matched: bool,
}

impl ValuePair {
    /// Exact: widths and every bit must agree.
    pub fn new(expected: BinaryValue, observed: BinaryValue) -> Self {
        ValuePair {
            expected,
            observed,
            matched: expected == observed,
        }
    }
}

pub type MatchResult = HarnessResult<ValuePair>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreboardStats {
    pub checks: u64,
    pub matched: u64,
    pub last_cycle: Option<u64>,
}

/// Compares predictions against the output value each record carries. The
/// first mismatch is returned as an error carrying the full context.
pub struct Scoreboard {
    signal: String,
    stats: Shared<ScoreboardStats>,
}

impl Scoreboard {
    pub fn new(output: SimObject) -> Self {
        Scoreboard {
            signal: output.name(),
            stats: Shared::default(),
        }
    }

    pub fn stats(&self) -> Shared<ScoreboardStats> {
        self.stats.clone()
    }

    /// Compares `expected` to the output the monitor settled for the same edge.
    pub fn check(&self, record: &ObservationRecord, expected: BinaryValue) -> MatchResult {
        let observed = record.output;
        let pair = ValuePair::new(expected, observed);
        self.stats.with_mut(|s| {
            s.checks += 1;
            s.matched += pair.matched as u64;
            s.last_cycle = Some(record.cycle);
        });
        if pair.matched {
            tracing::trace!(cycle = record.cycle, %expected, "match");
            return Ok(pair);
        }
        let report = MismatchReport {
            cycle: record.cycle,
            time_ps: record.time_ps,
            signal: self.signal.clone(),
            inputs: record.inputs.clone(),
            expected,
            observed,
        };
        tracing::error!(
            cycle = report.cycle,
            time_ps = report.time_ps,
            %expected,
            %observed,
            "{}",
            report
        );
        Err(HarnessError::Mismatch(Box::new(report)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cycle: u64, output: bool) -> ObservationRecord {
        ObservationRecord {
            cycle,
            time_ps: cycle * 10_000,
            inputs: vec![("inpt".to_string(), BinaryValue::bit(true))],
            output: BinaryValue::bit(output),
            valid: true,
        }
    }

    fn scoreboard() -> Scoreboard {
        Scoreboard {
            signal: "top.outpt".to_string(),
            stats: Shared::default(),
        }
    }

    #[test]
    fn width_is_part_of_equality() {
        let one_bit = BinaryValue::bit(true);
        let two_bits = BinaryValue::new(2, 1).unwrap();
        assert!(!ValuePair::new(one_bit, two_bits).matched);
        assert!(ValuePair::new(one_bit, BinaryValue::bit(true)).matched);
    }

    #[test]
    fn mismatch_carries_cycle_inputs_and_both_values() {
        let sb = scoreboard();
        let pair = sb.check(&record(7, true), BinaryValue::bit(true)).unwrap();
        assert!(pair.matched);
        // the observed side comes from the record, no simulator is involved
        let err = sb.check(&record(8, true), BinaryValue::bit(false)).unwrap_err();
        let report = err.mismatch().unwrap();
        assert_eq!(report.cycle, 8);
        assert_eq!(report.signal, "top.outpt");
        assert_eq!(report.inputs, vec![("inpt".to_string(), BinaryValue::bit(true))]);
        assert_eq!(report.expected, BinaryValue::bit(false));
        assert_eq!(report.observed, BinaryValue::bit(true));
        let text = err.to_string();
        assert!(text.contains("cycle 8"), "{}", text);

        let stats = sb.stats().snapshot();
        assert_eq!(stats.checks, 2);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.last_cycle, Some(8));
    }
}
