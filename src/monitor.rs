use futures::SinkExt;
use futures_channel::mpsc;

use crate::prelude::*;

/// Condition under which a sample means something to the reference model.
#[derive(Debug, Clone, Copy)]
pub enum Qualifier {
    /// Every edge, the model handles reset itself.
    Always,
    /// Reset low and enable high.
    Enabled { reset: SimObject, enable: SimObject },
}

impl Qualifier {
    fn holds(&self) -> HarnessResult<bool> {
        match self {
            Qualifier::Always => Ok(true),
            Qualifier::Enabled { reset, enable } => Ok(!reset.is_high()? && enable.is_high()?),
        }
    }
}

/// What to sample, and when.
#[derive(Debug, Clone)]
pub struct Probe {
    pub clock: SimObject,
    pub inputs: Vec<SimObject>,
    pub output: SimObject,
    pub qualifier: Qualifier,
}

/// Signal values at one rising edge.
///
/// Inputs are the values the design sampled on that edge; the output is the
/// settled value after it.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    /// Rising edges since the monitor started, from 0.
    pub cycle: u64,
    pub time_ps: u64,
    /// Keyed by leaf name (`"rst"`, not `"top.rst"`).
    pub inputs: Vec<(String, BinaryValue)>,
    pub output: BinaryValue,
    pub valid: bool,
}

impl ObservationRecord {
    pub fn input(&self, name: &str) -> Option<BinaryValue> {
        self.inputs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| *value)
    }

    /// Like [`input`](Self::input), for models that cannot work without it.
    pub fn require(&self, name: &str) -> HarnessResult<BinaryValue> {
        self.input(name)
            .ok_or_else(|| HarnessError::signal(name, "not sampled by the monitor"))
    }
}

fn leaf_name(obj: &SimObject) -> String {
    let full = obj.name();
    match full.rsplit_once('.') {
        Some((_, leaf)) => leaf.to_string(),
        None => full,
    }
}

pub struct Monitor {
    probe: Probe,
    names: Vec<String>,
    cycles: Shared<u64>,
}

impl Monitor {
    pub fn new(probe: Probe) -> Self {
        let names = probe.inputs.iter().map(leaf_name).collect();
        Monitor {
            probe,
            names,
            cycles: Shared::new(0),
        }
    }

    /// Rising edges seen so far.
    pub fn cycles(&self) -> Shared<u64> {
        self.cycles.clone()
    }

    fn sample_inputs(&self) -> HarnessResult<Vec<(String, BinaryValue)>> {
        self.names
            .iter()
            .zip(&self.probe.inputs)
            .map(|(name, obj)| Ok((name.clone(), obj.read()?)))
            .collect()
    }

    /// Samples every rising edge and forwards the valid records to `tx`.
    ///
    /// Inputs are read as soon as the edge wakes the monitor, before any
    /// write scheduled on that edge lands. The output is read in the
    /// read-only phase of the same time step.
    pub async fn run(self, mut tx: mpsc::Sender<ObservationRecord>) -> HarnessResult<()> {
        loop {
            self.probe.clock.rising_edge().await;
            let cycle = *self.cycles.get();
            *self.cycles.get_mut() += 1;

            let valid = self.probe.qualifier.holds()?;
            let inputs = self.sample_inputs()?;
            Trigger::read_only().await;
            let output = self.probe.output.read()?;
            let record = ObservationRecord {
                cycle,
                time_ps: sim_if().get_sim_time_ps(),
                inputs,
                output,
                valid,
            };
            tracing::trace!(cycle, valid, %output, "sampled");
            if valid {
                tx.send(record).await.map_err(|_| HarnessError::Cancelled {
                    task: "checker".to_string(),
                })?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ObservationRecord {
        ObservationRecord {
            cycle: 3,
            time_ps: 30_000,
            inputs: vec![
                ("rst".to_string(), BinaryValue::bit(false)),
                ("data".to_string(), BinaryValue::new(8, 0x12).unwrap()),
            ],
            output: BinaryValue::new(16, 0xe1f0).unwrap(),
            valid: true,
        }
    }

    #[test]
    fn inputs_are_looked_up_by_leaf_name() {
        let rec = record();
        assert_eq!(rec.input("data").map(|v| v.as_integer()), Some(0x12));
        assert_eq!(rec.input("top.data"), None);
        assert!(matches!(
            rec.require("en"),
            Err(HarnessError::Signal { .. })
        ));
    }
}
