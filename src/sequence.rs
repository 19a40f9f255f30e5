//! Stimulus: randomized sequence items, the generator producing them and the
//! handshake that hands them to a driver one at a time.

use futures::{SinkExt, StreamExt};
use futures_channel::{mpsc, oneshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::marker::PhantomData;

use crate::{HarnessError, HarnessResult};

/// One transaction. Randomization is a pure function of the RNG state, so a
/// fixed seed always reproduces the same stream.
pub trait SequenceItem: Sized + Clone + fmt::Debug + 'static {
    fn randomize(rng: StdRng) -> (Self, StdRng);
}

/// One random byte, for the CRC engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteItem {
    pub data: u8,
}

impl SequenceItem for ByteItem {
    fn randomize(mut rng: StdRng) -> (Self, StdRng) {
        let data = rng.gen::<u8>();
        (ByteItem { data }, rng)
    }
}

/// One random bit: the state machine input or the counter enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitItem {
    pub bit: bool,
}

impl SequenceItem for BitItem {
    fn randomize(mut rng: StdRng) -> (Self, StdRng) {
        let bit = rng.gen::<bool>();
        (BitItem { bit }, rng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxItem {
    pub inpt: u8,
    /// In `0..8`.
    pub sel: u8,
}

impl SequenceItem for MuxItem {
    fn randomize(mut rng: StdRng) -> (Self, StdRng) {
        let inpt = rng.gen::<u8>();
        let sel = rng.gen_range(0..8u8);
        (MuxItem { inpt, sel }, rng)
    }
}

/// Seeded item source, either bounded to a number of items or endless.
pub struct Generator<I> {
    rng: Option<StdRng>,
    limit: Option<u64>,
    produced: u64,
    _item: PhantomData<I>,
}

impl<I: SequenceItem> Generator<I> {
    /// Endless; the run stops it from outside.
    pub fn new(seed: u64) -> Self {
        Generator {
            rng: Some(StdRng::seed_from_u64(seed)),
            limit: None,
            produced: 0,
            _item: PhantomData,
        }
    }

    pub fn bounded(seed: u64, count: u64) -> Self {
        Generator {
            limit: Some(count),
            ..Generator::new(seed)
        }
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Feeds every item through `export`, waiting for the consumer to finish
    /// each one before producing the next. Returns the number of items.
    pub async fn run(mut self, mut export: ItemExport<I>) -> HarnessResult<u64> {
        while let Some(item) = self.next() {
            tracing::trace!(?item, n = self.produced, "start item");
            export.start_item(item).await?;
        }
        Ok(self.produced)
    }
}

impl<I: SequenceItem> Iterator for Generator<I> {
    type Item = I;

    fn next(&mut self) -> Option<I> {
        if self.limit.map_or(false, |limit| self.produced >= limit) {
            return None;
        }
        let rng = self.rng.take()?;
        let (item, rng) = I::randomize(rng);
        self.rng = Some(rng);
        self.produced += 1;
        Some(item)
    }
}

type Handoff<I> = (I, oneshot::Sender<()>);

/// Generator side of the handshake.
pub struct ItemExport<I> {
    tx: mpsc::Sender<Handoff<I>>,
}

/// Driver side of the handshake.
pub struct ItemPort<I> {
    rx: mpsc::Receiver<Handoff<I>>,
}

/// Must be completed by the driver once the item has been applied.
pub struct ItemDone(oneshot::Sender<()>);

/// A rendezvous: the generator's `start_item` returns only after the driver
/// has called `item_done` on that item.
pub fn sequencer<I>() -> (ItemExport<I>, ItemPort<I>) {
    let (tx, rx) = mpsc::channel(0);
    (ItemExport { tx }, ItemPort { rx })
}

impl<I> ItemExport<I> {
    pub async fn start_item(&mut self, item: I) -> HarnessResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send((item, done_tx))
            .await
            .map_err(|_| HarnessError::Cancelled {
                task: "driver".to_string(),
            })?;
        done_rx.await.map_err(|_| HarnessError::Cancelled {
            task: "driver".to_string(),
        })
    }
}

impl<I> ItemPort<I> {
    /// `None` once the generator is exhausted.
    pub async fn get_next_item(&mut self) -> Option<(I, ItemDone)> {
        self.rx
            .next()
            .await
            .map(|(item, done)| (item, ItemDone(done)))
    }
}

impl ItemDone {
    pub fn item_done(self) {
        let _ = self.0.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{self, Task};
    use crate::shared::Shared;

    #[test]
    fn same_seed_same_stream() {
        let a: Vec<ByteItem> = Generator::bounded(7, 32).collect();
        let b: Vec<ByteItem> = Generator::bounded(7, 32).collect();
        let c: Vec<ByteItem> = Generator::bounded(8, 32).collect();
        assert_eq!(a.len(), 32);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn randomize_is_pure() {
        let rng = StdRng::seed_from_u64(99);
        let (first, _) = MuxItem::randomize(rng.clone());
        let (again, _) = MuxItem::randomize(rng);
        assert_eq!(first, again);
    }

    #[test]
    fn selector_stays_in_range() {
        assert!(Generator::<MuxItem>::bounded(1, 500).all(|item| item.sel < 8));
    }

    #[test]
    fn endless_generator_keeps_going() {
        let mut stream = Generator::<BitItem>::new(3);
        assert_eq!(stream.by_ref().take(10_000).count(), 10_000);
        assert_eq!(stream.produced(), 10_000);
    }

    #[test]
    fn start_item_waits_for_item_done() {
        let (export, mut port) = sequencer::<ByteItem>();
        let log = Shared::new(Vec::new());

        let gen_log = log.clone();
        let producer = Task::fork(async move {
            let count = Generator::bounded(5, 3).run(export).await;
            gen_log.get_mut().push("generator done".to_string());
            count
        });
        let drv_log = log.clone();
        Task::fork(async move {
            while let Some((item, done)) = port.get_next_item().await {
                drv_log.get_mut().push(format!("got {}", item.data));
                done.item_done();
            }
            drv_log.get_mut().push("driver done".to_string());
        });
        let result = Shared::new(None);
        let result2 = result.clone();
        Task::fork(async move {
            *result2.get_mut() = Some(producer.await);
        });
        executor::run_once();

        let expected: Vec<u8> = Generator::<ByteItem>::bounded(5, 3).map(|i| i.data).collect();
        let log = log.get();
        let got: Vec<&String> = log.iter().filter(|l| l.starts_with("got")).collect();
        assert_eq!(got.len(), 3);
        for (line, data) in got.iter().zip(expected) {
            assert_eq!(**line, format!("got {}", data));
        }
        assert!(log.contains(&"driver done".to_string()));
        assert!(matches!(*result.get(), Some(Ok(Ok(3)))));
        executor::clear_tasks();
    }
}
