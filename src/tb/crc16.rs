use futures::future::LocalBoxFuture;

use crate::config::{HarnessConfig, RunLength};
use crate::driver::CrcDrive;
use crate::model::Crc16Model;
use crate::monitor::{Probe, Qualifier};
use crate::pipeline::{Pipeline, RunSummary};
use crate::prelude::*;
use crate::sim::{Crc16Device, Simulator};

pub const ITEMS: u64 = 100;

pub fn simulator() -> HarnessResult<Simulator> {
    Simulator::new("top").with_device(Crc16Device::new())
}

/// 100 random bytes after a 35 ns reset.
pub fn config() -> HarnessConfig {
    HarnessConfig::default().with_length(RunLength::Items(ITEMS))
}

pub fn pipeline(root: SimObject, config: HarnessConfig) -> HarnessResult<Pipeline<CrcDrive, Crc16Model>> {
    let clk = root.child("clk")?;
    let rst = root.child("rst")?;
    let en = root.child("en")?;
    let data = root.child("data")?;
    Ok(Pipeline {
        config,
        clock: clk,
        reset: rst,
        pattern: CrcDrive { clk, data, en },
        model: Crc16Model::new(),
        probe: Probe {
            clock: clk,
            inputs: vec![rst, en, data],
            output: root.child("crc")?,
            qualifier: Qualifier::Enabled { reset: rst, enable: en },
        },
    })
}

pub async fn run(root: SimObject, config: HarnessConfig) -> HarnessResult<RunSummary> {
    pipeline(root, config)?.run().await
}

pub fn test(root: SimObject) -> LocalBoxFuture<'static, HarnessResult<String>> {
    async move { run(root, config()).await.map(|summary| summary.to_string()) }.boxed_local()
}
