//! Behavioural designs the built-in simulator can host.
//!
//! Every device is synchronous: it samples its inputs on the rising edge of
//! its clock and drives its outputs non-blocking, so anything woken by the
//! same edge still sees the old outputs.

use once_cell::sync::Lazy;

use super::Bus;
use crate::value::mask;
use crate::HarnessResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub name: &'static str,
    pub width: u32,
    pub direction: Direction,
    /// Value before the first clock edge.
    pub init: u64,
}

impl Port {
    pub const fn input(name: &'static str, width: u32) -> Self {
        Port {
            name,
            width,
            direction: Direction::Input,
            init: 0,
        }
    }

    pub const fn output(name: &'static str, width: u32, init: u64) -> Self {
        Port {
            name,
            width,
            direction: Direction::Output,
            init,
        }
    }
}

pub trait Device {
    fn name(&self) -> &str;
    fn ports(&self) -> Vec<Port>;
    fn clock(&self) -> &'static str {
        "clk"
    }
    fn rising_edge(&mut self, bus: &mut Bus<'_>) -> HarnessResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FsmState {
    Reset,
    Idle,
    State1,
    State2,
    State3,
}

impl FsmState {
    fn output(self) -> u64 {
        match self {
            FsmState::Idle | FsmState::State2 => 1,
            FsmState::Reset | FsmState::State1 | FsmState::State3 => 0,
        }
    }
}

/// Five-state Moore machine with `clk`, `rst`, `inpt` and `outpt`.
/// A high `inpt` advances the state, reset wins over everything.
#[derive(Debug)]
pub struct StateMachineDevice {
    state: FsmState,
}

impl StateMachineDevice {
    pub fn new() -> Self {
        StateMachineDevice {
            state: FsmState::Reset,
        }
    }
}

impl Default for StateMachineDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for StateMachineDevice {
    fn name(&self) -> &str {
        "fsm"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::input("clk", 1),
            Port::input("rst", 1),
            Port::input("inpt", 1),
            Port::output("outpt", 1, 0),
        ]
    }

    fn rising_edge(&mut self, bus: &mut Bus<'_>) -> HarnessResult<()> {
        use FsmState::*;
        self.state = if bus.read_bool("rst")? {
            Reset
        } else {
            match (self.state, bus.read_bool("inpt")?) {
                (state, false) => state,
                (Reset, true) => Idle,
                (Idle, true) => State1,
                (State1, true) => State2,
                (State2, true) => State3,
                (State3, true) => Idle,
            }
        };
        bus.drive("outpt", self.state.output())
    }
}

pub(crate) const CRC16_POLY: u16 = 0x1021;
pub(crate) const CRC16_INIT: u16 = 0xffff;

static CRC16_TABLE: Lazy<[u16; 256]> = Lazy::new(|| {
    let mut table = [0u16; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut reg = (i as u16) << 8;
        for _ in 0..8 {
            reg = if reg & 0x8000 != 0 {
                (reg << 1) ^ CRC16_POLY
            } else {
                reg << 1
            };
        }
        *entry = reg;
    }
    table
});

/// Byte-wide CRC16 engine (poly 0x1021, init 0xFFFF, not reflected).
/// Accumulates `data` on every edge where `en` is high.
#[derive(Debug)]
pub struct Crc16Device {
    reg: u16,
}

impl Crc16Device {
    pub fn new() -> Self {
        Crc16Device { reg: CRC16_INIT }
    }
}

impl Default for Crc16Device {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for Crc16Device {
    fn name(&self) -> &str {
        "crc16"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::input("clk", 1),
            Port::input("rst", 1),
            Port::input("en", 1),
            Port::input("data", 8),
            Port::output("crc", 16, CRC16_INIT as u64),
        ]
    }

    fn rising_edge(&mut self, bus: &mut Bus<'_>) -> HarnessResult<()> {
        if bus.read_bool("rst")? {
            self.reg = CRC16_INIT;
        } else if bus.read_bool("en")? {
            let byte = bus.read("data")? as u8;
            self.reg = (self.reg << 8) ^ CRC16_TABLE[((self.reg >> 8) as u8 ^ byte) as usize];
        }
        bus.drive("crc", self.reg as u64)
    }
}

/// Registered 8:1 multiplexer: `outpt` takes bit `sel` of `inpt`.
#[derive(Debug, Default)]
pub struct MuxDevice;

impl Device for MuxDevice {
    fn name(&self) -> &str {
        "mux"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::input("clk", 1),
            Port::input("rst", 1),
            Port::input("inpt", 8),
            Port::input("sel", 3),
            Port::output("outpt", 1, 0),
        ]
    }

    fn rising_edge(&mut self, bus: &mut Bus<'_>) -> HarnessResult<()> {
        let out = if bus.read_bool("rst")? {
            0
        } else {
            (bus.read("inpt")? >> bus.read("sel")?) & 1
        };
        bus.drive("outpt", out)
    }
}

/// Wrapping up-counter that increments while `enable` is high.
#[derive(Debug)]
pub struct CounterDevice {
    width: u32,
    count: u64,
}

impl CounterDevice {
    pub fn new(width: u32) -> Self {
        CounterDevice { width, count: 0 }
    }
}

impl Device for CounterDevice {
    fn name(&self) -> &str {
        "counter"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::input("clk", 1),
            Port::input("rst", 1),
            Port::input("enable", 1),
            Port::output("count", self.width, 0),
        ]
    }

    fn rising_edge(&mut self, bus: &mut Bus<'_>) -> HarnessResult<()> {
        if bus.read_bool("rst")? {
            self.count = 0;
        } else if bus.read_bool("enable")? {
            self.count = (self.count + 1) & mask(self.width);
        }
        bus.drive("count", self.count)
    }
}

/// Wraps a device and flips bit 0 of one output on a single clock edge.
/// Edges are counted from zero, starting with the first rising edge.
#[derive(Debug)]
pub struct FaultInjector<D> {
    inner: D,
    output: &'static str,
    at_edge: u64,
    edges: u64,
}

impl<D: Device> FaultInjector<D> {
    pub fn new(inner: D, output: &'static str, at_edge: u64) -> Self {
        FaultInjector {
            inner,
            output,
            at_edge,
            edges: 0,
        }
    }
}

impl<D: Device> Device for FaultInjector<D> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn ports(&self) -> Vec<Port> {
        self.inner.ports()
    }

    fn clock(&self) -> &'static str {
        self.inner.clock()
    }

    fn rising_edge(&mut self, bus: &mut Bus<'_>) -> HarnessResult<()> {
        self.inner.rising_edge(bus)?;
        if self.edges == self.at_edge {
            let good = match bus.scheduled(self.output) {
                Some(value) => value,
                None => bus.read(self.output)?,
            };
            tracing::debug!(edge = self.edges, output = self.output, "injecting fault");
            bus.drive(self.output, good ^ 1)?;
        }
        self.edges += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_bitwise_division() {
        assert_eq!(CRC16_TABLE[0], 0);
        assert_eq!(CRC16_TABLE[1], CRC16_POLY);
        // 0xFFFF ^ (0x00 << 8) run through the table equals the bit-serial result
        let reg = CRC16_INIT;
        let next = (reg << 8) ^ CRC16_TABLE[((reg >> 8) as u8) as usize];
        assert_eq!(next, 0xe1f0);
    }

    #[test]
    fn fsm_outputs_follow_state() {
        assert_eq!(FsmState::Reset.output(), 0);
        assert_eq!(FsmState::Idle.output(), 1);
        assert_eq!(FsmState::State1.output(), 0);
        assert_eq!(FsmState::State2.output(), 1);
        assert_eq!(FsmState::State3.output(), 0);
    }
}
