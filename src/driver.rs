//! Drivers: take items from the sequencer one at a time and apply them to the
//! design at clock-relative instants.

use futures::future::{FutureExt, LocalBoxFuture};

use crate::config::Timing;
use crate::prelude::*;
use crate::sequence::{BitItem, ByteItem, ItemPort, MuxItem, SequenceItem};
use crate::testbench::reset_sequence;

/// How one kind of item is applied to the design.
pub trait DrivePattern: 'static {
    type Item: SequenceItem;

    /// Puts the stimulus signals to their inactive value. Called once, before reset.
    fn idle(&self) -> HarnessResult<()>;

    /// Applies `item` and returns once the design has had the clock edges it
    /// needs to consume it.
    fn drive(&mut self, item: Self::Item) -> LocalBoxFuture<'_, HarnessResult<()>>;
}

/// Byte on `data` qualified by `en` for exactly one edge.
pub struct CrcDrive {
    pub clk: SimObject,
    pub data: SimObject,
    pub en: SimObject,
}

impl DrivePattern for CrcDrive {
    type Item = ByteItem;

    fn idle(&self) -> HarnessResult<()> {
        self.en.write_immediate(1, 0)?;
        self.data.write_immediate(8, 0)
    }

    fn drive(&mut self, item: ByteItem) -> LocalBoxFuture<'_, HarnessResult<()>> {
        async move {
            self.data.write_scheduled(BinaryValue::new(8, item.data as u64)?)?;
            self.en.write_scheduled(BinaryValue::bit(true))?;
            self.clk.rising_edge().await;
            // deassert so the byte is not accumulated twice
            self.en.write_scheduled(BinaryValue::bit(false))?;
            self.clk.rising_edge().await;
            Ok::<(), HarnessError>(())
        }
        .boxed_local()
    }
}

/// One bit on a single input, held for one edge.
pub struct BitDrive {
    pub clk: SimObject,
    pub inpt: SimObject,
}

impl DrivePattern for BitDrive {
    type Item = BitItem;

    fn idle(&self) -> HarnessResult<()> {
        self.inpt.write_immediate(1, 0)
    }

    fn drive(&mut self, item: BitItem) -> LocalBoxFuture<'_, HarnessResult<()>> {
        async move {
            self.inpt.write_scheduled(BinaryValue::bit(item.bit))?;
            self.clk.rising_edge().await;
            Ok::<(), HarnessError>(())
        }
        .boxed_local()
    }
}

pub struct MuxDrive {
    pub clk: SimObject,
    pub inpt: SimObject,
    pub sel: SimObject,
}

impl DrivePattern for MuxDrive {
    type Item = MuxItem;

    fn idle(&self) -> HarnessResult<()> {
        self.inpt.write_immediate(8, 0)?;
        self.sel.write_immediate(3, 0)
    }

    fn drive(&mut self, item: MuxItem) -> LocalBoxFuture<'_, HarnessResult<()>> {
        async move {
            self.inpt.write_scheduled(BinaryValue::new(8, item.inpt as u64)?)?;
            self.sel.write_scheduled(BinaryValue::new(3, item.sel as u64)?)?;
            self.clk.rising_edge().await;
            Ok::<(), HarnessError>(())
        }
        .boxed_local()
    }
}

/// Waits for an edge, then changes the enable.
pub struct EnableDrive {
    pub clk: SimObject,
    pub enable: SimObject,
}

impl DrivePattern for EnableDrive {
    type Item = BitItem;

    fn idle(&self) -> HarnessResult<()> {
        self.enable.write_immediate(1, 0)
    }

    fn drive(&mut self, item: BitItem) -> LocalBoxFuture<'_, HarnessResult<()>> {
        async move {
            self.clk.rising_edge().await;
            self.enable.write_scheduled(BinaryValue::bit(item.bit))
        }
        .boxed_local()
    }
}

pub struct Driver<P: DrivePattern> {
    pattern: P,
    rst: SimObject,
    timing: Timing,
    port: ItemPort<P::Item>,
    driven: Shared<u64>,
}

impl<P: DrivePattern> Driver<P> {
    pub fn new(pattern: P, rst: SimObject, timing: Timing, port: ItemPort<P::Item>) -> Self {
        Driver {
            pattern,
            rst,
            timing,
            port,
            driven: Shared::new(0),
        }
    }

    /// Number of items applied so far, readable while the driver runs.
    pub fn progress(&self) -> Shared<u64> {
        self.driven.clone()
    }

    /// Resets the design, then applies items until the sequencer runs dry.
    /// Any refused write ends the run.
    pub async fn run(mut self) -> HarnessResult<u64> {
        self.pattern.idle()?;
        reset_sequence(self.rst, self.timing.reset, self.timing.settle).await?;
        while let Some((item, done)) = self.port.get_next_item().await {
            tracing::debug!(?item, n = *self.driven.get(), "driving item");
            self.pattern.drive(item).await?;
            *self.driven.get_mut() += 1;
            done.item_done();
        }
        let driven = *self.driven.get();
        tracing::debug!(driven, "sequencer exhausted");
        Ok(driven)
    }
}
