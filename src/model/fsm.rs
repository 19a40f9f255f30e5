use std::collections::HashMap;

use super::ReferenceModel;
use crate::monitor::ObservationRecord;
use crate::value::BinaryValue;
use crate::{HarnessError, HarnessResult};

/// Explicitly enumerated transition and output table of a one-input,
/// one-output state machine. States are indices into the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTable {
    names: Vec<String>,
    // next[state][input]
    next: Vec<[usize; 2]>,
    output: Vec<bool>,
    initial: usize,
}

#[derive(Debug, Default)]
pub struct StateTableBuilder {
    initial: String,
    rows: Vec<(String, bool, String, String)>,
}

impl StateTableBuilder {
    /// Adds a state with its output and its successors for input 0 and 1.
    pub fn state(mut self, name: &str, output: bool, on_0: &str, on_1: &str) -> Self {
        self.rows
            .push((name.to_string(), output, on_0.to_string(), on_1.to_string()));
        self
    }

    /// Fails unless every state is declared once and every successor exists.
    pub fn build(self) -> HarnessResult<StateTable> {
        let mut index = HashMap::new();
        for (i, (name, ..)) in self.rows.iter().enumerate() {
            if index.insert(name.as_str(), i).is_some() {
                return Err(HarnessError::config(format!(
                    "state {} declared twice",
                    name
                )));
            }
        }
        let lookup = |from: &str, to: &str| {
            index.get(to).copied().ok_or_else(|| {
                HarnessError::config(format!("transition {} -> {} to unknown state", from, to))
            })
        };
        let mut next = Vec::with_capacity(self.rows.len());
        for (name, _, on_0, on_1) in &self.rows {
            next.push([lookup(name, on_0)?, lookup(name, on_1)?]);
        }
        let initial = *index.get(self.initial.as_str()).ok_or_else(|| {
            HarnessError::config(format!("initial state {} not declared", self.initial))
        })?;
        Ok(StateTable {
            names: self.rows.iter().map(|(name, ..)| name.clone()).collect(),
            next,
            output: self.rows.iter().map(|(_, out, ..)| *out).collect(),
            initial,
        })
    }
}

impl StateTable {
    pub fn builder(initial: &str) -> StateTableBuilder {
        StateTableBuilder {
            initial: initial.to_string(),
            rows: Vec::new(),
        }
    }

    /// RESET → IDLE → STATE1 → STATE2 → STATE3 → IDLE on every high input,
    /// holding on a low input. Outputs 0, 1, 0, 1, 0.
    pub fn simple() -> Self {
        StateTable {
            names: ["RESET", "IDLE", "STATE1", "STATE2", "STATE3"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            next: vec![[0, 1], [1, 2], [2, 3], [3, 4], [4, 1]],
            output: vec![false, true, false, true, false],
            initial: 0,
        }
    }

    pub fn initial(&self) -> usize {
        self.initial
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, state: usize) -> &str {
        self.names.get(state).map(String::as_str).unwrap_or("<invalid>")
    }

    pub fn state(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn transition(&self, state: usize, input: bool) -> HarnessResult<usize> {
        self.next
            .get(state)
            .map(|row| row[input as usize])
            .ok_or_else(|| HarnessError::config(format!("no state with index {}", state)))
    }

    pub fn output(&self, state: usize) -> HarnessResult<bool> {
        self.output
            .get(state)
            .copied()
            .ok_or_else(|| HarnessError::config(format!("no state with index {}", state)))
    }
}

/// State machine model. Reset wins over the input, and the output is the
/// output of the state entered on the same edge.
#[derive(Debug, Clone)]
pub struct FsmModel {
    table: StateTable,
    reset: String,
    input: String,
}

impl FsmModel {
    pub fn new(table: StateTable) -> Self {
        FsmModel {
            table,
            reset: "rst".to_string(),
            input: "inpt".to_string(),
        }
    }

    pub fn with_ports(mut self, reset: &str, input: &str) -> Self {
        self.reset = reset.to_string();
        self.input = input.to_string();
        self
    }

    pub fn table(&self) -> &StateTable {
        &self.table
    }
}

impl ReferenceModel for FsmModel {
    type State = usize;

    fn initial_state(&self) -> usize {
        self.table.initial()
    }

    fn step(&self, state: &usize, record: &ObservationRecord) -> HarnessResult<usize> {
        if record.require(&self.reset)?.as_bool() {
            return Ok(self.table.initial());
        }
        let input = record.require(&self.input)?.as_bool();
        self.table.transition(*state, input)
    }

    fn output(&self, state: &usize) -> HarnessResult<BinaryValue> {
        Ok(BinaryValue::bit(self.table.output(*state)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::record;
    use crate::model::Predictor;
    use proptest::prelude::*;

    fn rec(cycle: u64, rst: u64, inpt: u64) -> ObservationRecord {
        record(cycle, &[("rst", 1, rst), ("inpt", 1, inpt)])
    }

    #[test]
    fn builder_matches_the_canonical_table() {
        let built = StateTable::builder("RESET")
            .state("RESET", false, "RESET", "IDLE")
            .state("IDLE", true, "IDLE", "STATE1")
            .state("STATE1", false, "STATE1", "STATE2")
            .state("STATE2", true, "STATE2", "STATE3")
            .state("STATE3", false, "STATE3", "IDLE")
            .build()
            .unwrap();
        assert_eq!(built, StateTable::simple());
    }

    #[test]
    fn incomplete_tables_are_rejected() {
        let missing = StateTable::builder("RESET")
            .state("RESET", false, "RESET", "IDLE")
            .build();
        assert!(matches!(missing, Err(HarnessError::Config(_))));

        let duplicate = StateTable::builder("A")
            .state("A", false, "A", "A")
            .state("A", true, "A", "A")
            .build();
        assert!(matches!(duplicate, Err(HarnessError::Config(_))));

        let no_initial = StateTable::builder("B").state("A", false, "A", "A").build();
        assert!(matches!(no_initial, Err(HarnessError::Config(_))));
    }

    #[test]
    fn five_ones_walk_the_ring() {
        let model = FsmModel::new(StateTable::simple());
        let mut predictor = Predictor::new(model.clone());
        let mut states = Vec::new();
        let mut outputs = Vec::new();
        // reset held for the first edge, then released
        for (cycle, rst) in [1, 0, 0, 0, 0, 0].into_iter().enumerate() {
            let out = predictor.predict(&rec(cycle as u64, rst, 1)).unwrap();
            states.push(model.table().name(*predictor.state()).to_string());
            outputs.push(out.as_integer());
        }
        assert_eq!(
            states,
            ["RESET", "IDLE", "STATE1", "STATE2", "STATE3", "IDLE"]
        );
        assert_eq!(outputs, [0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn low_input_holds_the_state() {
        let model = FsmModel::new(StateTable::simple());
        for state in 0..model.table().len() {
            assert_eq!(model.step(&state, &rec(0, 0, 0)).unwrap(), state);
        }
    }

    #[test]
    fn missing_reset_sample_is_an_error() {
        let model = FsmModel::new(StateTable::simple());
        let bare = record(0, &[("inpt", 1, 1)]);
        assert!(matches!(
            model.step(&0, &bare),
            Err(HarnessError::Signal { .. })
        ));
    }

    proptest! {
        #[test]
        fn reset_wins_over_any_state_and_input(state in 0usize..5, inpt in 0u64..2) {
            let model = FsmModel::new(StateTable::simple());
            let next = model.step(&state, &rec(0, 1, inpt)).unwrap();
            prop_assert_eq!(model.table().name(next), "RESET");
            prop_assert_eq!(model.output(&next).unwrap().as_integer(), 0);
        }

        #[test]
        fn output_follows_the_state_entered(state in 0usize..5, inpt in 0u64..2) {
            let expected = [("RESET", 0u64), ("IDLE", 1), ("STATE1", 0), ("STATE2", 1), ("STATE3", 0)];
            let model = FsmModel::new(StateTable::simple());
            let next = model.step(&state, &rec(0, 0, inpt)).unwrap();
            let (name, out) = expected[next];
            prop_assert_eq!(model.table().name(next), name);
            prop_assert_eq!(model.output(&next).unwrap().as_integer(), out);
        }

        #[test]
        fn same_inputs_same_trace(bits in proptest::collection::vec(any::<bool>(), 0..64)) {
            let run = || {
                let mut p = Predictor::new(FsmModel::new(StateTable::simple()));
                bits.iter()
                    .enumerate()
                    .map(|(i, b)| p.predict(&rec(i as u64, 0, *b as u64)).unwrap().as_integer())
                    .collect::<Vec<_>>()
            };
            prop_assert_eq!(run(), run());
        }
    }
}
