use crate::sim_if::{sim_if, ObjectKind, WriteMode};
use crate::trigger::Trigger;
use crate::value::BinaryValue;
use crate::{HarnessError, HarnessResult};

/// Handle to a scope or signal of the simulated design.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimObject {
    pub(crate) handle: usize,
    pub(crate) kind: ObjectKind,
}

impl SimObject {
    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> String {
        sim_if()
            .get_full_name(self.handle)
            .unwrap_or_else(|_| format!("<handle {}>", self.handle))
    }

    /// Zero for scopes.
    pub fn width(&self) -> u32 {
        match self.kind {
            ObjectKind::BitVector(width) => width,
            ObjectKind::Hier => 0,
        }
    }

    pub fn get_root() -> HarnessResult<Self> {
        let sim = sim_if();
        let handle = sim.get_root_handle()?;
        Ok(SimObject {
            handle,
            kind: sim.get_kind(handle)?,
        })
    }

    pub fn from_name(full_name: &str) -> HarnessResult<Self> {
        let sim = sim_if();
        let handle = sim.get_handle_by_name(full_name)?;
        Ok(SimObject {
            handle,
            kind: sim.get_kind(handle)?,
        })
    }

    pub fn child(&self, name: &str) -> HarnessResult<Self> {
        let mut child_name = self.name();
        child_name.push('.');
        child_name.push_str(name);
        SimObject::from_name(&child_name)
    }

    /// Like [`child`](Self::child), for testbench code where a missing signal is a typo.
    pub fn c(&self, name: &str) -> Self {
        self.child(name)
            .unwrap_or_else(|_| panic!("Could not get object with name {}.{}", self.name(), name))
    }

    pub fn read(&self) -> HarnessResult<BinaryValue> {
        sim_if().get_value(self.handle)
    }

    pub fn u64(&self) -> HarnessResult<u64> {
        Ok(self.read()?.as_integer())
    }

    pub fn bin(&self) -> HarnessResult<String> {
        Ok(self.read()?.bin_str())
    }

    pub fn is_high(&self) -> HarnessResult<bool> {
        Ok(self.read()?.as_bool())
    }

    /// Applies with no simulation-time delay. Safe from edge races, used for
    /// reset and clock generation.
    pub fn write_immediate(&self, width: u32, value: u64) -> HarnessResult<()> {
        let value = self.checked(width, value)?;
        sim_if().set_value(self.handle, value, WriteMode::Immediate)
    }

    /// Applies once every task woken in the current delta has run, so tasks
    /// sharing an edge all see the pre-edge value.
    pub fn write_scheduled(&self, value: BinaryValue) -> HarnessResult<()> {
        let value = self.checked(value.width(), value.as_integer())?;
        sim_if().set_value(self.handle, value, WriteMode::Scheduled)
    }

    pub fn set(&self, value: u64) -> HarnessResult<()> {
        let value = self.checked(self.width(), value)?;
        sim_if().set_value(self.handle, value, WriteMode::Scheduled)
    }

    pub fn set_immediate(&self, value: u64) -> HarnessResult<()> {
        self.write_immediate(self.width(), value)
    }

    pub fn set_bin(&self, val: &str) -> HarnessResult<()> {
        let value = BinaryValue::from_bin_str(val)
            .map_err(|e| HarnessError::signal(self.name(), e.to_string()))?;
        self.write_scheduled(value)
    }

    #[inline]
    fn checked(&self, width: u32, value: u64) -> HarnessResult<BinaryValue> {
        match self.kind {
            ObjectKind::BitVector(size) if size == width => BinaryValue::new(width, value)
                .map_err(|e| HarnessError::signal(self.name(), e.to_string())),
            ObjectKind::BitVector(size) => Err(HarnessError::signal(
                self.name(),
                format!("can't write {} bits to a {} bit signal", width, size),
            )),
            ObjectKind::Hier => Err(HarnessError::signal(self.name(), "scope has no value")),
        }
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(self) -> Trigger {
        Trigger::rising_edge(self)
    }
    pub async fn rising_edge_ro(self) {
        self.rising_edge().await;
        Trigger::read_only().await;
    }
    pub async fn rising_edge_rw(self) {
        self.rising_edge().await;
        Trigger::read_write().await;
    }
    pub fn falling_edge(self) -> Trigger {
        Trigger::falling_edge(self)
    }
    pub fn edge(self) -> Trigger {
        Trigger::edge(self)
    }
}
