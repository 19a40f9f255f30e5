use std::cell::RefCell;
use std::rc::Rc;

use crate::time::{self, SimDuration, TimeUnit};
use crate::value::BinaryValue;
use crate::HarnessResult;

thread_local! {
    static SIM_IF: RefCell<Option<Rc<dyn SimIf>>> = RefCell::new(None);
}

/// Makes `sim` the interface every signal, trigger and log call of this thread goes through.
pub fn install(sim: Rc<dyn SimIf>) {
    SIM_IF.with(|s| *s.borrow_mut() = Some(sim));
}

pub fn uninstall() {
    SIM_IF.with(|s| *s.borrow_mut() = None);
}

pub fn is_installed() -> bool {
    SIM_IF.with(|s| s.borrow().is_some())
}

/// The installed simulator interface.
///
/// Tasks only ever run from inside a simulator's event loop, so an
/// interface is always installed when this is reached from testbench code.
pub fn sim_if() -> Rc<dyn SimIf> {
    SIM_IF
        .with(|s| s.borrow().clone())
        .expect("no simulator interface installed on this thread")
}

#[derive(Debug, Hash, Clone, Copy, Eq, PartialEq)]
pub enum SimCallback {
    /// Relative when registered, absolute when reported back.
    Time(u64),
    /// Value change on a signal handle.
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Applied with no simulation-time delay.
    Immediate,
    /// Applied after the active region of the current delta cycle.
    Scheduled,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Hier,
    BitVector(u32),
}

/// Signal interface and clock/event source of a simulator.
pub trait SimIf {
    fn get_handle_by_name(&self, name: &str) -> HarnessResult<usize>;
    fn get_root_handle(&self) -> HarnessResult<usize>;
    fn get_full_name(&self, handle: usize) -> HarnessResult<String>;
    fn get_kind(&self, handle: usize) -> HarnessResult<ObjectKind>;
    fn get_value(&self, handle: usize) -> HarnessResult<BinaryValue>;
    fn set_value(&self, handle: usize, value: BinaryValue, mode: WriteMode) -> HarnessResult<()>;
    fn get_sim_time_steps(&self) -> u64;
    fn get_sim_precision(&self) -> i8;
    fn register_callback(&self, cb: SimCallback) -> HarnessResult<usize>;
    fn cancel_callback(&self, cb_hdl: usize) -> HarnessResult<()>;
    fn log(&self, msg: &str);

    fn get_sim_time(&self, unit: TimeUnit) -> f64 {
        // does not preserve precision, don't use for anything but display
        time::steps_to(self.get_sim_time_steps(), self.get_sim_precision(), unit)
    }
    fn get_sim_time_ps(&self) -> u64 {
        let steps = self.get_sim_time_steps();
        SimDuration::ps(1)
            .to_steps(self.get_sim_precision())
            .map(|per_ps| steps / per_ps.max(1))
            .unwrap_or_else(|_| self.get_sim_time(TimeUnit::Ps) as u64)
    }
    fn get_sim_steps(&self, duration: SimDuration) -> HarnessResult<u64> {
        duration.to_steps(self.get_sim_precision())
    }
}
