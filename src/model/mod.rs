//! Reference models and the predictor that owns their state.
//!
//! A model is a pure step function over observation records. The state it
//! steps lives only inside a [`Predictor`], nobody else reads or writes it.

pub mod counter;
pub mod crc;
pub mod fsm;
pub mod mux;

use std::fmt;

use crate::monitor::ObservationRecord;
use crate::value::BinaryValue;
use crate::HarnessResult;

pub use counter::CounterModel;
pub use crc::{crc16, crc16_update, Crc16Model, CRC16_INIT};
pub use fsm::{FsmModel, StateTable};
pub use mux::MuxModel;

pub trait ReferenceModel: 'static {
    type State: Clone + fmt::Debug;

    fn initial_state(&self) -> Self::State;

    /// Next state after the edge described by `record`.
    fn step(&self, state: &Self::State, record: &ObservationRecord) -> HarnessResult<Self::State>;

    /// Output the design should show in `state`.
    fn output(&self, state: &Self::State) -> HarnessResult<BinaryValue>;
}

pub struct Predictor<M: ReferenceModel> {
    model: M,
    state: M::State,
    steps: u64,
}

impl<M: ReferenceModel> Predictor<M> {
    pub fn new(model: M) -> Self {
        let state = model.initial_state();
        Predictor {
            model,
            state,
            steps: 0,
        }
    }

    /// Consumes one record and returns the expected output after it.
    /// Invalid records leave the state untouched.
    pub fn predict(&mut self, record: &ObservationRecord) -> HarnessResult<BinaryValue> {
        if record.valid {
            self.state = self.model.step(&self.state, record)?;
            self.steps += 1;
        }
        let expected = self.model.output(&self.state)?;
        tracing::trace!(cycle = record.cycle, state = ?self.state, %expected, "predicted");
        Ok(expected)
    }

    pub fn state(&self) -> &M::State {
        &self.state
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A record with the given inputs, as the monitor would produce it.
    pub fn record(cycle: u64, inputs: &[(&str, u32, u64)]) -> ObservationRecord {
        ObservationRecord {
            cycle,
            time_ps: cycle * 10_000,
            inputs: inputs
                .iter()
                .map(|(name, width, value)| {
                    (name.to_string(), BinaryValue::new(*width, *value).unwrap())
                })
                .collect(),
            output: BinaryValue::bit(false),
            valid: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::record;
    use super::*;

    #[test]
    fn invalid_records_do_not_advance_the_predictor() {
        let mut predictor = Predictor::new(CounterModel::new(8));
        let mut rec = record(0, &[("rst", 1, 0), ("enable", 1, 1)]);
        assert_eq!(predictor.predict(&rec).unwrap().as_integer(), 1);
        rec.valid = false;
        assert_eq!(predictor.predict(&rec).unwrap().as_integer(), 1);
        assert_eq!(predictor.steps(), 1);
        assert_eq!(*predictor.state(), 1);
    }
}
