//! Ready-made benches, one per design the built-in simulator can host.
//!
//! Each bench module exposes the same four entry points: `simulator()` builds
//! a fresh simulator with the design, `config()` is the bench's default run
//! configuration, `pipeline()` wires the pipeline to the design's signals and
//! `test()` is the bench as a registered test.

pub mod counter;
pub mod crc16;
pub mod fsm;
pub mod mux;

use crate::test::{Regression, Test};

pub fn regression() -> Regression {
    Regression::new("checkbench")
        .with(Test::new("simple_state_machine", fsm::simulator, fsm::test))
        .with(Test::new("crc16_ccitt", crc16::simulator, crc16::test))
        .with(Test::new("mux_8bit", mux::simulator, mux::test))
        .with(Test::new("simple_counter", counter::simulator, counter::test))
}
