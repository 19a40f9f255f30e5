use super::ReferenceModel;
use crate::monitor::ObservationRecord;
use crate::value::BinaryValue;
use crate::{HarnessError, HarnessResult};

/// Registered 8:1 mux. The selected bit is found by indexing the input's
/// binary string read LSB first.
#[derive(Debug, Clone)]
pub struct MuxModel {
    reset: String,
    input: String,
    select: String,
}

impl MuxModel {
    pub fn new() -> Self {
        MuxModel {
            reset: "rst".to_string(),
            input: "inpt".to_string(),
            select: "sel".to_string(),
        }
    }

    pub fn with_ports(mut self, reset: &str, input: &str, select: &str) -> Self {
        self.reset = reset.to_string();
        self.input = input.to_string();
        self.select = select.to_string();
        self
    }
}

impl Default for MuxModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceModel for MuxModel {
    type State = bool;

    fn initial_state(&self) -> bool {
        false
    }

    fn step(&self, _: &bool, record: &ObservationRecord) -> HarnessResult<bool> {
        if record.require(&self.reset)?.as_bool() {
            return Ok(false);
        }
        let sel = record.require(&self.select)?.as_integer() as usize;
        let input = record.require(&self.input)?;
        input.bits_lsb_first().get(sel).copied().ok_or_else(|| {
            HarnessError::signal(
                self.select.as_str(),
                format!("selects bit {} of a {} bit input", sel, input.width()),
            )
        })
    }

    fn output(&self, state: &bool) -> HarnessResult<BinaryValue> {
        Ok(BinaryValue::bit(*state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::record;

    #[test]
    fn selects_lsb_first() {
        let model = MuxModel::new();
        // 0b0000_0010: only bit 1 is set
        for (sel, expected) in [(0, false), (1, true), (7, false)] {
            let rec = record(0, &[("rst", 1, 0), ("inpt", 8, 0b10), ("sel", 3, sel)]);
            assert_eq!(model.step(&false, &rec).unwrap(), expected);
        }
        let rec = record(0, &[("rst", 1, 0), ("inpt", 8, 0x80), ("sel", 3, 7)]);
        assert!(model.step(&false, &rec).unwrap());
    }

    #[test]
    fn reset_forces_zero() {
        let rec = record(0, &[("rst", 1, 1), ("inpt", 8, 0xff), ("sel", 3, 3)]);
        assert!(!MuxModel::new().step(&true, &rec).unwrap());
    }

    #[test]
    fn renamed_ports() {
        let model = MuxModel::new().with_ports("reset_n", "din", "addr");
        let rec = record(0, &[("reset_n", 1, 0), ("din", 8, 0b100), ("addr", 3, 2)]);
        assert!(model.step(&false, &rec).unwrap());
        // the default names are not looked up any more
        let rec = record(0, &[("rst", 1, 0), ("inpt", 8, 0b100), ("sel", 3, 2)]);
        assert!(matches!(model.step(&false, &rec), Err(HarnessError::Signal { .. })));
    }
}
