//! Event-driven simulator implementing [`SimIf`] in-process.
//!
//! One time slot runs as: active region (ready tasks) → edge evaluation
//! (devices sample on their clock's rising edge and schedule outputs, then
//! edge callbacks fire) → apply scheduled writes → read-write callbacks,
//! repeated until nothing changes, then one read-only callback, then the
//! timer wheel advances to the next slot.

pub mod device;

use intmap::IntMap;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use crate::executor;
use crate::sim_if::{ObjectKind, SimCallback, SimIf, WriteMode};
use crate::time::{self, SimDuration, TimeUnit};
use crate::trigger::{self, EdgeKind};
use crate::value::{mask, BinaryValue};
use crate::{HarnessError, HarnessResult};

pub use device::{
    CounterDevice, Crc16Device, Device, Direction, FaultInjector, MuxDevice, Port,
    StateMachineDevice,
};

const ROOT_HANDLE: usize = 0;
const MAX_DELTAS_PER_STEP: u32 = 10_000;

#[derive(Debug)]
struct SignalSlot {
    name: String,
    width: u32,
    value: u64,
}

#[derive(Debug, Clone, Copy)]
struct Change {
    handle: usize,
    old: u64,
    new: u64,
}

impl Change {
    fn edge(&self, width: u32) -> EdgeKind {
        if width != 1 {
            return EdgeKind::Any;
        }
        match (self.old & 1, self.new & 1) {
            (0, 1) => EdgeKind::Rising,
            (1, 0) => EdgeKind::Falling,
            _ => EdgeKind::Any,
        }
    }
}

struct SimState {
    now: u64,
    top: String,
    signals: Vec<SignalSlot>,
    by_name: HashMap<String, usize>,
    scheduled: Vec<(usize, u64)>,
    changes: Vec<Change>,
    // absolute step -> callback handles, earliest first
    timers: BTreeMap<u64, Vec<usize>>,
    callbacks: IntMap<SimCallback>,
    // signal handle -> callback handle
    edge_watch: IntMap<usize>,
    read_write: Option<usize>,
    read_only: Option<usize>,
    in_read_only: bool,
    next_cb: usize,
    fault: Option<HarnessError>,
}

impl SimState {
    fn slot(&self, handle: usize) -> HarnessResult<&SignalSlot> {
        handle
            .checked_sub(1)
            .and_then(|i| self.signals.get(i))
            .ok_or_else(|| HarnessError::signal(format!("<handle {}>", handle), "unknown handle"))
    }

    fn write(&mut self, handle: usize, value: u64) {
        if let Some(slot) = handle.checked_sub(1).and_then(|i| self.signals.get_mut(i)) {
            if slot.value != value {
                self.changes.push(Change {
                    handle,
                    old: slot.value,
                    new: value,
                });
                slot.value = value;
            }
        }
    }

    fn handle_of(&self, port: &str) -> HarnessResult<usize> {
        let full = format!("{}.{}", self.top, port);
        self.by_name
            .get(&full)
            .copied()
            .ok_or_else(|| HarnessError::signal(full, "no such signal"))
    }

    fn next_timer(&mut self) -> Option<(u64, Vec<usize>)> {
        while let Some((t, handles)) = self.timers.pop_first() {
            let live: Vec<usize> = handles
                .into_iter()
                .filter(|h| self.callbacks.contains_key(*h as u64))
                .collect();
            if !live.is_empty() {
                return Some((t, live));
            }
        }
        None
    }
}

/// A device's view of the signals while it evaluates a clock edge.
pub struct Bus<'a> {
    state: &'a mut SimState,
}

impl<'a> Bus<'a> {
    pub fn read(&self, port: &str) -> HarnessResult<u64> {
        let handle = self.state.handle_of(port)?;
        Ok(self.state.slot(handle)?.value)
    }

    pub fn read_bool(&self, port: &str) -> HarnessResult<bool> {
        Ok(self.read(port)? & 1 == 1)
    }

    /// Non-blocking: visible after every task woken by this edge has run.
    pub fn drive(&mut self, port: &str, value: u64) -> HarnessResult<()> {
        let handle = self.state.handle_of(port)?;
        let width = self.state.slot(handle)?.width;
        self.state.scheduled.push((handle, value & mask(width)));
        Ok(())
    }

    /// Last value scheduled for `port` in this delta, if any.
    pub fn scheduled(&self, port: &str) -> Option<u64> {
        let handle = self.state.handle_of(port).ok()?;
        self.state
            .scheduled
            .iter()
            .rev()
            .find(|(h, _)| *h == handle)
            .map(|(_, v)| *v)
    }
}

struct Instance {
    clock: usize,
    device: Box<dyn Device>,
}

#[derive(Debug, Clone)]
pub enum EndReason {
    /// No more events are scheduled.
    Quiescent,
    TimeLimit,
    Fault(HarnessError),
}

#[derive(Debug, Clone)]
pub struct SimEnd {
    pub time_steps: u64,
    pub reason: EndReason,
}

pub struct Simulator {
    state: RefCell<SimState>,
    devices: RefCell<Vec<Instance>>,
    precision: i8,
    time_limit: Option<SimDuration>,
}

impl Simulator {
    pub fn new(top: &str) -> Self {
        Simulator {
            state: RefCell::new(SimState {
                now: 0,
                top: top.to_string(),
                signals: Vec::new(),
                by_name: HashMap::new(),
                scheduled: Vec::new(),
                changes: Vec::new(),
                timers: BTreeMap::new(),
                callbacks: IntMap::new(),
                edge_watch: IntMap::new(),
                read_write: None,
                read_only: None,
                in_read_only: false,
                next_cb: 1,
                fault: None,
            }),
            devices: RefCell::new(Vec::new()),
            precision: TimeUnit::Ps.scale(),
            time_limit: None,
        }
    }

    pub fn with_precision(mut self, unit: TimeUnit) -> Self {
        self.precision = unit.scale();
        self
    }

    /// Stop the run once simulated time passes `limit`.
    pub fn with_time_limit(mut self, limit: SimDuration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Declares a signal in the top scope, all zeros.
    pub fn with_signal(self, name: &str, width: u32) -> HarnessResult<Self> {
        self.declare(name, width, 0)?;
        Ok(self)
    }

    pub fn with_device(self, device: impl Device + 'static) -> HarnessResult<Self> {
        for port in device.ports() {
            self.declare(port.name, port.width, port.init)?;
        }
        let clock = self.state.borrow().handle_of(device.clock())?;
        if self.state.borrow().slot(clock)?.width != 1 {
            return Err(HarnessError::config(format!(
                "clock '{}' of {} is not a single bit",
                device.clock(),
                device.name()
            )));
        }
        self.devices.borrow_mut().push(Instance {
            clock,
            device: Box::new(device),
        });
        Ok(self)
    }

    fn declare(&self, name: &str, width: u32, init: u64) -> HarnessResult<usize> {
        let init = BinaryValue::new(width, init)?;
        let mut state = self.state.borrow_mut();
        let full = format!("{}.{}", state.top, name);
        if let Some(&handle) = state.by_name.get(&full) {
            let existing = state.slot(handle)?.width;
            if existing != width {
                return Err(HarnessError::config(format!(
                    "signal {} declared with widths {} and {}",
                    full, existing, width
                )));
            }
            return Ok(handle);
        }
        state.signals.push(SignalSlot {
            name: full.clone(),
            width,
            value: init.as_integer(),
        });
        let handle = state.signals.len();
        state.by_name.insert(full, handle);
        Ok(handle)
    }

    pub fn now(&self) -> u64 {
        self.state.borrow().now
    }

    /// Current value of a top-level signal, for inspection after a run.
    pub fn peek(&self, name: &str) -> Option<BinaryValue> {
        let state = self.state.borrow();
        let handle = state.handle_of(name).ok()?;
        let slot = state.slot(handle).ok()?;
        BinaryValue::new(slot.width, slot.value).ok()
    }

    /// Runs until no event is left, the time limit is hit or a device faults.
    pub fn run(&self) -> HarnessResult<SimEnd> {
        let limit = self
            .time_limit
            .map(|d| d.to_steps(self.precision))
            .transpose()?;
        loop {
            executor::run_once();
            self.settle();
            self.read_only_phase();
            if let Some(fault) = self.state.borrow_mut().fault.take() {
                return Ok(self.end(EndReason::Fault(fault)));
            }

            let next = self.state.borrow_mut().next_timer();
            let (t, handles) = match next {
                Some(next) => next,
                None => return Ok(self.end(EndReason::Quiescent)),
            };
            if limit.map_or(false, |limit| t > limit) {
                return Ok(self.end(EndReason::TimeLimit));
            }
            self.state.borrow_mut().now = t;
            for handle in handles {
                let live = self.state.borrow_mut().callbacks.remove(handle as u64).is_some();
                if live {
                    trigger::react(SimCallback::Time(t), None);
                }
            }
        }
    }

    fn end(&self, reason: EndReason) -> SimEnd {
        SimEnd {
            time_steps: self.now(),
            reason,
        }
    }

    fn settle(&self) {
        let mut deltas = 0;
        loop {
            deltas += 1;
            if deltas > MAX_DELTAS_PER_STEP {
                let time_ps = self.get_sim_time_ps();
                self.state.borrow_mut().fault.get_or_insert(HarnessError::Stalled {
                    time_ps,
                    reason: format!("more than {} delta cycles in one time step", MAX_DELTAS_PER_STEP),
                });
                return;
            }

            let changes = std::mem::take(&mut self.state.borrow_mut().changes);
            if !changes.is_empty() {
                self.evaluate(changes);
                continue;
            }

            let scheduled = std::mem::take(&mut self.state.borrow_mut().scheduled);
            if !scheduled.is_empty() {
                let mut state = self.state.borrow_mut();
                for (handle, value) in scheduled {
                    state.write(handle, value);
                }
                continue;
            }

            let rw = {
                let mut state = self.state.borrow_mut();
                let rw = state.read_write.take();
                if let Some(handle) = rw {
                    state.callbacks.remove(handle as u64);
                }
                rw
            };
            if rw.is_some() {
                trigger::react(SimCallback::ReadWrite, None);
                continue;
            }
            break;
        }
    }

    fn evaluate(&self, changes: Vec<Change>) {
        let mut fire = Vec::with_capacity(changes.len());
        {
            let mut state = self.state.borrow_mut();
            let mut devices = self.devices.borrow_mut();
            for change in &changes {
                let width = state.slot(change.handle).map(|s| s.width).unwrap_or(0);
                let edge = change.edge(width);
                if edge == EdgeKind::Rising {
                    for inst in devices.iter_mut().filter(|i| i.clock == change.handle) {
                        let result = {
                            let mut bus = Bus { state: &mut *state };
                            inst.device.rising_edge(&mut bus)
                        };
                        if let Err(e) = result {
                            tracing::error!(device = inst.device.name(), error = %e, "device fault");
                            state.fault.get_or_insert(e);
                        }
                    }
                }
                fire.push((change.handle, edge));
            }
        }
        for (handle, edge) in fire {
            let watched = self.state.borrow().edge_watch.contains_key(handle as u64);
            if watched {
                trigger::react(SimCallback::Edge(handle), Some(edge));
            }
        }
    }

    fn read_only_phase(&self) {
        let ro = {
            let mut state = self.state.borrow_mut();
            let ro = state.read_only.take();
            if let Some(handle) = ro {
                state.callbacks.remove(handle as u64);
                state.in_read_only = true;
            }
            ro
        };
        if ro.is_some() {
            trigger::react(SimCallback::ReadOnly, None);
            self.state.borrow_mut().in_read_only = false;
        }
    }
}

impl SimIf for Simulator {
    fn get_handle_by_name(&self, name: &str) -> HarnessResult<usize> {
        let state = self.state.borrow();
        if name == state.top {
            return Ok(ROOT_HANDLE);
        }
        state
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| HarnessError::signal(name, "no such object"))
    }

    fn get_root_handle(&self) -> HarnessResult<usize> {
        Ok(ROOT_HANDLE)
    }

    fn get_full_name(&self, handle: usize) -> HarnessResult<String> {
        let state = self.state.borrow();
        if handle == ROOT_HANDLE {
            return Ok(state.top.clone());
        }
        Ok(state.slot(handle)?.name.clone())
    }

    fn get_kind(&self, handle: usize) -> HarnessResult<ObjectKind> {
        if handle == ROOT_HANDLE {
            return Ok(ObjectKind::Hier);
        }
        Ok(ObjectKind::BitVector(self.state.borrow().slot(handle)?.width))
    }

    fn get_value(&self, handle: usize) -> HarnessResult<BinaryValue> {
        let state = self.state.borrow();
        if handle == ROOT_HANDLE {
            return Err(HarnessError::signal(state.top.clone(), "scope has no value"));
        }
        let slot = state.slot(handle)?;
        BinaryValue::new(slot.width, slot.value)
    }

    fn set_value(&self, handle: usize, value: BinaryValue, mode: WriteMode) -> HarnessResult<()> {
        let mut state = self.state.borrow_mut();
        let slot = state.slot(handle)?;
        if slot.width != value.width() {
            return Err(HarnessError::signal(
                slot.name.clone(),
                format!("can't write {} bits to a {} bit signal", value.width(), slot.width),
            ));
        }
        if state.in_read_only {
            return Err(HarnessError::signal(
                slot.name.clone(),
                "write during the read-only phase",
            ));
        }
        match mode {
            WriteMode::Immediate => state.write(handle, value.as_integer()),
            WriteMode::Scheduled => state.scheduled.push((handle, value.as_integer())),
        }
        Ok(())
    }

    fn get_sim_time_steps(&self) -> u64 {
        self.state.borrow().now
    }

    fn get_sim_precision(&self) -> i8 {
        self.precision
    }

    fn register_callback(&self, cb: SimCallback) -> HarnessResult<usize> {
        let mut state = self.state.borrow_mut();
        if let SimCallback::Edge(sig) = cb {
            state.slot(sig)?;
        }
        let handle = state.next_cb;
        state.next_cb += 1;
        state.callbacks.insert(handle as u64, cb);
        match cb {
            SimCallback::Time(dt) => {
                let abs = state.now + dt;
                state.timers.entry(abs).or_default().push(handle);
            }
            SimCallback::Edge(sig) => {
                state.edge_watch.insert(sig as u64, handle);
            }
            SimCallback::ReadWrite => state.read_write = Some(handle),
            SimCallback::ReadOnly => state.read_only = Some(handle),
        }
        Ok(handle)
    }

    fn cancel_callback(&self, cb_hdl: usize) -> HarnessResult<()> {
        let mut state = self.state.borrow_mut();
        match state.callbacks.remove(cb_hdl as u64) {
            Some(SimCallback::Edge(sig)) => {
                if state.edge_watch.get(sig as u64) == Some(&cb_hdl) {
                    state.edge_watch.remove(sig as u64);
                }
            }
            Some(SimCallback::ReadWrite) => {
                if state.read_write == Some(cb_hdl) {
                    state.read_write = None;
                }
            }
            Some(SimCallback::ReadOnly) => {
                if state.read_only == Some(cb_hdl) {
                    state.read_only = None;
                }
            }
            // stale timer entries are skipped when the wheel reaches them
            Some(SimCallback::Time(_)) => {}
            None => {
                return Err(HarnessError::signal(
                    state.top.clone(),
                    format!("no callback with handle {}", cb_hdl),
                ))
            }
        }
        Ok(())
    }

    fn log(&self, msg: &str) {
        let steps = self.get_sim_time_steps();
        let ns = time::steps_to(steps, self.precision, TimeUnit::Ns);
        tracing::info!(sim_time_ns = ns, "{}", msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SimObject;
    use crate::sim_if;
    use crate::trigger::Trigger;
    use crate::Task;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn install(sim: Simulator) -> Rc<Simulator> {
        let sim = Rc::new(sim);
        sim_if::install(sim.clone());
        sim
    }

    fn teardown() {
        trigger::cancel_all_triggers();
        executor::clear_tasks();
        sim_if::uninstall();
    }

    #[test]
    fn timers_advance_time_in_order() {
        let sim = install(Simulator::new("top"));
        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, tag) in [(30u64, 'c'), (10, 'a'), (20, 'b')] {
            let log = log.clone();
            Task::fork(async move {
                Trigger::timer(SimDuration::ns(delay)).unwrap().await;
                log.borrow_mut().push((tag, sim_if::sim_if().get_sim_time_steps()));
            });
        }
        let end = sim.run().unwrap();
        assert!(matches!(end.reason, EndReason::Quiescent));
        assert_eq!(
            *log.borrow(),
            vec![('a', 10_000), ('b', 20_000), ('c', 30_000)]
        );
        teardown();
    }

    #[test]
    fn scheduled_writes_are_not_visible_to_tasks_woken_by_the_same_edge() {
        let sim = install(
            Simulator::new("top")
                .with_signal("clk", 1)
                .unwrap()
                .with_signal("d", 8)
                .unwrap(),
        );
        let seen = Rc::new(RefCell::new(Vec::new()));
        let root = SimObject::get_root().unwrap();
        let (clk, d) = (root.c("clk"), root.c("d"));
        {
            let seen = seen.clone();
            Task::fork(async move {
                clk.rising_edge().await;
                d.set(0x5a).unwrap();
                seen.borrow_mut().push(("writer", d.u64().unwrap()));
            });
        }
        {
            let seen = seen.clone();
            Task::fork(async move {
                clk.rising_edge().await;
                seen.borrow_mut().push(("reader", d.u64().unwrap()));
                Trigger::read_only().await;
                seen.borrow_mut().push(("settled", d.u64().unwrap()));
            });
        }
        Task::fork(async move {
            Trigger::timer(SimDuration::ns(5)).unwrap().await;
            clk.set_immediate(1).unwrap();
        });
        sim.run().unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![("writer", 0), ("reader", 0), ("settled", 0x5a)]
        );
        teardown();
    }

    #[test]
    fn writes_in_read_only_phase_are_refused() {
        let sim = install(Simulator::new("top").with_signal("a", 1).unwrap());
        let result = Rc::new(RefCell::new(None));
        let result2 = result.clone();
        Task::fork(async move {
            Trigger::read_only().await;
            let a = SimObject::from_name("top.a").unwrap();
            *result2.borrow_mut() = Some(a.set_immediate(1));
        });
        sim.run().unwrap();
        assert!(matches!(
            result.borrow().as_ref(),
            Some(Err(HarnessError::Signal { .. }))
        ));
        teardown();
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let _sim = install(Simulator::new("top").with_signal("sel", 3).unwrap());
        let sel = SimObject::from_name("top.sel").unwrap();
        assert_eq!(sel.width(), 3);
        assert!(sel.write_immediate(8, 1).is_err());
        assert!(sel.write_immediate(3, 8).is_err());
        assert!(sel.write_immediate(3, 7).is_ok());
        assert!(matches!(
            sel.set(8),
            Err(HarnessError::Signal { ref signal, .. }) if signal == "top.sel"
        ));
        assert!(sel.set(7).is_ok());
        teardown();
    }

    #[test]
    fn zero_time_oscillation_stalls_with_the_time_in_picoseconds() {
        let sim = install(
            Simulator::new("top")
                .with_precision(TimeUnit::Ns)
                .with_signal("loop_back", 1)
                .unwrap(),
        );
        let sig = SimObject::from_name("top.loop_back").unwrap();
        Task::fork(async move {
            Trigger::timer(SimDuration::ns(5)).unwrap().await;
            loop {
                let flipped = !sig.is_high().unwrap();
                sig.set_immediate(flipped as u64).unwrap();
                sig.edge().await;
            }
        });
        let end = sim.run().unwrap();
        match end.reason {
            EndReason::Fault(HarnessError::Stalled { time_ps, .. }) => assert_eq!(time_ps, 5_000),
            other => panic!("expected a stall, got {:?}", other),
        }
        teardown();
    }

    #[test]
    fn losing_first_of_registrations_are_withdrawn() {
        let sim = install(Simulator::new("top").with_signal("sig", 1).unwrap());
        let sig = SimObject::from_name("top.sig").unwrap();
        let winner = Rc::new(RefCell::new(None));
        let winner2 = winner.clone();
        Task::fork(async move {
            let timeout = Trigger::timer(SimDuration::ns(100)).unwrap();
            let fell = Trigger::falling_edge(sig);
            *winner2.borrow_mut() = Trigger::first_of(vec![timeout, fell, sig.rising_edge()])
                .await
                .ok();
        });
        Task::fork(async move {
            Trigger::timer(SimDuration::ns(5)).unwrap().await;
            sig.set_immediate(1).unwrap();
        });
        let end = sim.run().unwrap();
        assert_eq!(*winner.borrow(), Some(2));
        // neither the 100 ns timer nor the falling edge keeps the simulator busy
        assert!(matches!(end.reason, EndReason::Quiescent));
        assert_eq!(end.time_steps, 5_000);
        assert!(sim.state.borrow().edge_watch.get(sig.handle() as u64).is_none());
        teardown();
    }

    #[test]
    fn time_limit_stops_a_free_running_clock() {
        let sim = install(
            Simulator::new("top")
                .with_signal("clk", 1)
                .unwrap()
                .with_time_limit(SimDuration::ns(100)),
        );
        let clk = SimObject::from_name("top.clk").unwrap();
        Task::fork(crate::testbench::clock(clk, SimDuration::ns(10)));
        let end = sim.run().unwrap();
        assert!(matches!(end.reason, EndReason::TimeLimit));
        assert!(end.time_steps <= 100_000);
        teardown();
    }

    #[test]
    fn conflicting_declarations_are_config_errors() {
        let err = Simulator::new("top")
            .with_signal("x", 1)
            .unwrap()
            .with_signal("x", 2)
            .err()
            .unwrap();
        assert!(matches!(err, HarnessError::Config(_)));
    }
}
