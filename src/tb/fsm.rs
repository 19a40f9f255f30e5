use futures::future::LocalBoxFuture;

use crate::config::HarnessConfig;
use crate::driver::BitDrive;
use crate::model::{FsmModel, StateTable};
use crate::monitor::{Probe, Qualifier};
use crate::pipeline::{Pipeline, RunSummary};
use crate::prelude::*;
use crate::sim::{Simulator, StateMachineDevice};

pub fn simulator() -> HarnessResult<Simulator> {
    Simulator::new("top").with_device(StateMachineDevice::new())
}

/// 10 ns clock, 35 ns reset, 1000 ns of random input bits.
pub fn config() -> HarnessConfig {
    HarnessConfig::default()
}

pub fn pipeline(root: SimObject, config: HarnessConfig) -> HarnessResult<Pipeline<BitDrive, FsmModel>> {
    let clk = root.child("clk")?;
    let rst = root.child("rst")?;
    let inpt = root.child("inpt")?;
    Ok(Pipeline {
        config,
        clock: clk,
        reset: rst,
        pattern: BitDrive { clk, inpt },
        model: FsmModel::new(StateTable::simple()),
        probe: Probe {
            clock: clk,
            inputs: vec![rst, inpt],
            output: root.child("outpt")?,
            // the model tracks reset itself
            qualifier: Qualifier::Always,
        },
    })
}

pub async fn run(root: SimObject, config: HarnessConfig) -> HarnessResult<RunSummary> {
    pipeline(root, config)?.run().await
}

pub fn test(root: SimObject) -> LocalBoxFuture<'static, HarnessResult<String>> {
    async move { run(root, config()).await.map(|summary| summary.to_string()) }.boxed_local()
}
