use futures::future::LocalBoxFuture;

use crate::config::HarnessConfig;
use crate::driver::MuxDrive;
use crate::model::MuxModel;
use crate::monitor::{Probe, Qualifier};
use crate::pipeline::{Pipeline, RunSummary};
use crate::prelude::*;
use crate::sim::{MuxDevice, Simulator};

pub fn simulator() -> HarnessResult<Simulator> {
    Simulator::new("top").with_device(MuxDevice)
}

pub fn config() -> HarnessConfig {
    HarnessConfig::default()
}

pub fn pipeline(root: SimObject, config: HarnessConfig) -> HarnessResult<Pipeline<MuxDrive, MuxModel>> {
    let clk = root.child("clk")?;
    let rst = root.child("rst")?;
    let inpt = root.child("inpt")?;
    let sel = root.child("sel")?;
    Ok(Pipeline {
        config,
        clock: clk,
        reset: rst,
        pattern: MuxDrive { clk, inpt, sel },
        model: MuxModel::new(),
        probe: Probe {
            clock: clk,
            inputs: vec![rst, inpt, sel],
            output: root.child("outpt")?,
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
