use futures::future::LocalBoxFuture;

use crate::config::{HarnessConfig, RunLength, TimingConfig};
use crate::driver::EnableDrive;
use crate::model::CounterModel;
use crate::monitor::{Probe, Qualifier};
use crate::pipeline::{Pipeline, RunSummary};
use crate::prelude::*;
use crate::sim::{CounterDevice, Simulator};

pub const WIDTH: u32 = 8;
pub const ITEMS: u64 = 1000;

pub fn simulator() -> HarnessResult<Simulator> {
    Simulator::new("top").with_device(CounterDevice::new(WIDTH))
}

/// 1000 random enables after a 30 ns reset.
pub fn config() -> HarnessConfig {
    HarnessConfig {
        timing: TimingConfig {
            reset_time: SimDuration::ns(30),
            ..TimingConfig::default()
        },
        ..HarnessConfig::default()
    }
    .with_length(RunLength::Items(ITEMS))
}

pub fn pipeline(root: SimObject, config: HarnessConfig) -> HarnessResult<Pipeline<EnableDrive, CounterModel>> {
    let clk = root.child("clk")?;
    let rst = root.child("rst")?;
    let enable = root.child("enable")?;
    Ok(Pipeline {
        config,
        clock: clk,
        reset: rst,
        pattern: EnableDrive { clk, enable },
        model: CounterModel::new(WIDTH),
        probe: Probe {
            clock: clk,
            inputs: vec![rst, enable],
            output: root.child("count")?,
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
