use super::ReferenceModel;
use crate::monitor::ObservationRecord;
use crate::value::{mask, BinaryValue};
use crate::HarnessResult;

/// Counts enabled edges modulo 2^width; reset clears.
#[derive(Debug, Clone)]
pub struct CounterModel {
    width: u32,
    reset: String,
    enable: String,
}

impl CounterModel {
    pub fn new(width: u32) -> Self {
        CounterModel {
            width,
            reset: "rst".to_string(),
            enable: "enable".to_string(),
        }
    }

    pub fn with_ports(mut self, reset: &str, enable: &str) -> Self {
        self.reset = reset.to_string();
        self.enable = enable.to_string();
        self
    }
}

impl ReferenceModel for CounterModel {
    type State = u64;

    fn initial_state(&self) -> u64 {
        0
    }

    fn step(&self, count: &u64, record: &ObservationRecord) -> HarnessResult<u64> {
        if record.require(&self.reset)?.as_bool() {
            Ok(0)
        } else if record.require(&self.enable)?.as_bool() {
            Ok((count + 1) & mask(self.width))
        } else {
            Ok(*count)
        }
    }

    fn output(&self, count: &u64) -> HarnessResult<BinaryValue> {
        BinaryValue::new(self.width, *count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::record;

    #[test]
    fn wraps_at_width() {
        let model = CounterModel::new(2);
        let rec = record(0, &[("rst", 1, 0), ("enable", 1, 1)]);
        assert_eq!(model.step(&3, &rec).unwrap(), 0);
        let idle = record(0, &[("rst", 1, 0), ("enable", 1, 0)]);
        assert_eq!(model.step(&2, &idle).unwrap(), 2);
        let reset = record(0, &[("rst", 1, 1), ("enable", 1, 1)]);
        assert_eq!(model.step(&2, &reset).unwrap(), 0);
    }

    #[test]
    fn counts_on_renamed_ports() {
        let model = CounterModel::new(4).with_ports("clear", "ce");
        let rec = record(0, &[("clear", 1, 0), ("ce", 1, 1)]);
        assert_eq!(model.step(&9, &rec).unwrap(), 10);
        let clear = record(0, &[("clear", 1, 1), ("ce", 1, 1)]);
        assert_eq!(model.step(&9, &clear).unwrap(), 0);
    }
}
