use futures::future::select_all;
use intmap::IntMap;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::executor;
use crate::signal::SimObject;
use crate::sim_if::{sim_if, SimCallback};
use crate::time::SimDuration;
use crate::{HarnessError, HarnessResult};

// IntMap specializes on u64 keys and doesn't need to hash
thread_local! {
    // key is signal handle
    static EDGE_MAP: RefCell<IntMap<CallbackHandles>> = RefCell::new(IntMap::new());
    // key is absolute callback time
    static TIMER_MAP: RefCell<IntMap<CallbackHandles>> = RefCell::new(IntMap::new());
    static READ_ONLY: RefCell<CallbackHandles> = RefCell::new(CallbackHandles::default());
    static READ_WRITE: RefCell<CallbackHandles> = RefCell::new(CallbackHandles::default());
}

#[derive(Default)]
struct CallbackHandles {
    handle: Option<usize>,
    callbacks: VecDeque<TrigShared>,
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

#[derive(PartialEq, Clone, Copy, Debug)]
enum TrigState {
    Idle,
    Waiting,
    Fired,
    // the awaiting future went away, e.g. the loser of a first_of
    Dropped,
}

#[derive(Debug, Clone)]
struct TrigShared {
    waker: Waker,
    // An edge callback is shared by all triggers on a signal, so each entry
    // remembers which edge it is waiting for.
    edge_kind: EdgeKind,
    state: Rc<Cell<TrigState>>,
}

impl TrigShared {
    fn live(&self) -> bool {
        self.state.get() == TrigState::Waiting
    }
}

pub(crate) fn cancel_all_triggers() {
    let mut handles = Vec::new();
    READ_ONLY.with(|ro| handles.extend(std::mem::take(&mut *ro.borrow_mut()).handle));
    READ_WRITE.with(|rw| handles.extend(std::mem::take(&mut *rw.borrow_mut()).handle));
    TIMER_MAP.with(|m| handles.extend(m.borrow_mut().drain().filter_map(|(_, cb)| cb.handle)));
    EDGE_MAP.with(|m| handles.extend(m.borrow_mut().drain().filter_map(|(_, cb)| cb.handle)));
    if crate::sim_if::is_installed() {
        let sim = sim_if();
        for handle in handles {
            let _ = sim.cancel_callback(handle);
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum TrigKind {
    Edge(usize, EdgeKind),
    Timer(u64),
    ReadWrite,
    ReadOnly,
}

/// A suspension point. Awaiting it parks the task until the simulator reports the event.
#[derive(Debug)]
pub struct Trigger {
    kind: TrigKind,
    state: Rc<Cell<TrigState>>,
    // absolute step a timer was registered for
    due: Cell<u64>,
}

impl Trigger {
    fn new(kind: TrigKind) -> Self {
        Trigger {
            kind,
            state: Rc::new(Cell::new(TrigState::Idle)),
            due: Cell::new(0),
        }
    }
    pub fn timer(duration: SimDuration) -> HarnessResult<Self> {
        Ok(Trigger::timer_steps(sim_if().get_sim_steps(duration)?))
    }
    pub fn timer_steps(steps: u64) -> Self {
        Trigger::new(TrigKind::Timer(steps))
    }
    pub async fn timer_ro(duration: SimDuration) -> HarnessResult<()> {
        Trigger::timer(duration)?.await;
        Trigger::read_only().await;
        Ok(())
    }
    pub async fn timer_rw(duration: SimDuration) -> HarnessResult<()> {
        Trigger::timer(duration)?.await;
        Trigger::read_write().await;
        Ok(())
    }
    pub fn edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Any))
    }
    pub fn rising_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Rising))
    }
    pub fn falling_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Falling))
    }
    pub fn read_write() -> Self {
        Trigger::new(TrigKind::ReadWrite)
    }
    /// End of the current time step, all values have settled. Writes are refused.
    pub fn read_only() -> Self {
        Trigger::new(TrigKind::ReadOnly)
    }

    /// Waits for whichever trigger fires first and returns its index.
    /// The others are withdrawn.
    pub async fn first_of(triggers: Vec<Trigger>) -> HarnessResult<usize> {
        if triggers.is_empty() {
            return Err(HarnessError::config("first_of needs at least one trigger"));
        }
        let (_, index, _rest) = select_all(triggers).await;
        Ok(index)
    }

    fn register(&self, waker: Waker) {
        let mut shared = TrigShared {
            waker,
            edge_kind: EdgeKind::Any,
            state: self.state.clone(),
        };
        let sim = sim_if();
        let result = match self.kind {
            TrigKind::ReadWrite => READ_WRITE.with(|rw| {
                let mut rw = rw.borrow_mut();
                rw.callbacks.push_back(shared);
                if rw.handle.is_none() {
                    rw.handle = Some(sim.register_callback(SimCallback::ReadWrite)?);
                }
                Ok::<(), HarnessError>(())
            }),
            TrigKind::ReadOnly => READ_ONLY.with(|ro| {
                let mut ro = ro.borrow_mut();
                ro.callbacks.push_back(shared);
                if ro.handle.is_none() {
                    ro.handle = Some(sim.register_callback(SimCallback::ReadOnly)?);
                }
                Ok::<(), HarnessError>(())
            }),
            TrigKind::Timer(t) => {
                // Add current time to key since the simulator reports absolute time, not delta
                let abs_time = t + sim.get_sim_time_steps();
                self.due.set(abs_time);
                TIMER_MAP.with(|m| {
                    let mut m = m.borrow_mut();
                    if let Some(callbacks) = m.get_mut(abs_time) {
                        callbacks.callbacks.push_back(shared);
                    } else {
                        let handle = sim.register_callback(SimCallback::Time(t))?;
                        let mut callbacks = VecDeque::new();
                        callbacks.push_back(shared);
                        m.insert(
                            abs_time,
                            CallbackHandles {
                                handle: Some(handle),
                                callbacks,
                            },
                        );
                    }
                    Ok::<(), HarnessError>(())
                })
            }
            TrigKind::Edge(sig_hdl, edge_kind) => {
                shared.edge_kind = edge_kind;
                EDGE_MAP.with(|m| {
                    let mut m = m.borrow_mut();
                    if let Some(callbacks) = m.get_mut(sig_hdl as u64) {
                        callbacks.callbacks.push_back(shared);
                    } else {
                        let handle = sim.register_callback(SimCallback::Edge(sig_hdl))?;
                        let mut callbacks = VecDeque::new();
                        callbacks.push_back(shared);
                        m.insert(
                            sig_hdl as u64,
                            CallbackHandles {
                                handle: Some(handle),
                                callbacks,
                            },
                        );
                    }
                    Ok::<(), HarnessError>(())
                })
            }
        };
        if let Err(e) = result {
            // the trigger never fires, the run stalls and the stall is reported
            tracing::error!(error = %e, kind = ?self.kind, "could not register trigger");
        }
    }

    /// Takes a dropped trigger out of its callback list. The simulator
    /// callback goes away with the last waiter.
    fn withdraw(&self) {
        let handle = match self.kind {
            TrigKind::ReadWrite => READ_WRITE.with(prune_single),
            TrigKind::ReadOnly => READ_ONLY.with(prune_single),
            TrigKind::Timer(_) => TIMER_MAP.with(|m| prune_keyed(m, self.due.get())),
            TrigKind::Edge(sig_hdl, _) => EDGE_MAP.with(|m| prune_keyed(m, sig_hdl as u64)),
        };
        if let Some(handle) = handle {
            if crate::sim_if::is_installed() {
                let _ = sim_if().cancel_callback(handle);
            }
        }
    }
}

// A borrow that is already held means react is draining the list, which
// skips dead entries by itself.
fn prune_single(cbs: &RefCell<CallbackHandles>) -> Option<usize> {
    let mut cbs = cbs.try_borrow_mut().ok()?;
    cbs.callbacks.retain(TrigShared::live);
    if cbs.callbacks.is_empty() {
        cbs.handle.take()
    } else {
        None
    }
}

fn prune_keyed(map: &RefCell<IntMap<CallbackHandles>>, key: u64) -> Option<usize> {
    let mut map = map.try_borrow_mut().ok()?;
    let cbs = map.get_mut(key)?;
    cbs.callbacks.retain(TrigShared::live);
    if cbs.callbacks.is_empty() {
        map.remove(key).and_then(|cbs| cbs.handle)
    } else {
        None
    }
}

impl Future for Trigger {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.state.get() {
            TrigState::Fired => Poll::Ready(()),
            // spurious wake-up
            TrigState::Waiting => Poll::Pending,
            TrigState::Idle | TrigState::Dropped => {
                self.state.set(TrigState::Waiting);
                self.register(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl Drop for Trigger {
    fn drop(&mut self) {
        if self.state.get() == TrigState::Waiting {
            self.state.set(TrigState::Dropped);
            self.withdraw();
        }
    }
}

/// Called by the simulator when a registered callback fires. Wakes the waiting
/// tasks in the order they started waiting and runs them.
#[inline]
pub fn react(cb: SimCallback, edge: Option<EdgeKind>) {
    let to_wake: VecDeque<TrigShared> = match cb {
        SimCallback::ReadWrite => READ_WRITE.with(|rw| {
            let mut rw = rw.borrow_mut();
            rw.handle = None; // callback is done
            std::mem::take(&mut rw.callbacks)
        }),
        SimCallback::ReadOnly => READ_ONLY.with(|ro| {
            let mut ro = ro.borrow_mut();
            ro.handle = None;
            std::mem::take(&mut ro.callbacks)
        }),
        SimCallback::Time(t) => TIMER_MAP
            .with(|m| m.borrow_mut().remove(t))
            .map(|cb| cb.callbacks)
            .unwrap_or_default(),
        SimCallback::Edge(sig_hdl) => {
            let edge = edge.unwrap_or(EdgeKind::Any);
            let (wake, cancel) = EDGE_MAP.with(|m| {
                let mut m = m.borrow_mut();
                let mut wake = VecDeque::new();
                let mut cancel = None;
                if let Some(mut callbacks) = m.remove(sig_hdl as u64) {
                    let mut resched = VecDeque::new();
                    for trig in callbacks.callbacks.drain(..).filter(TrigShared::live) {
                        if trig.edge_kind == EdgeKind::Any || trig.edge_kind == edge {
                            wake.push_back(trig);
                        } else {
                            resched.push_back(trig);
                        }
                    }
                    if resched.is_empty() {
                        // nobody left waiting on this signal
                        cancel = callbacks.handle;
                    } else {
                        callbacks.callbacks = resched;
                        m.insert(sig_hdl as u64, callbacks);
                    }
                }
                (wake, cancel)
            });
            if let Some(handle) = cancel {
                let _ = sim_if().cancel_callback(handle);
            }
            wake
        }
    };

    let mut woke = false;
    for shared in to_wake.into_iter().filter(TrigShared::live) {
        shared.state.set(TrigState::Fired);
        shared.waker.wake();
        woke = true;
    }
    if woke {
        executor::run_once();
    }
}
