//! Self-checking testbench harness for clocked digital designs.
//!
//! Stimulus is generated, driven, observed, predicted and checked by
//! cooperative tasks running on a single-threaded executor that is stepped by
//! a simulator through the [`sim_if::SimIf`] interface. The crate carries an
//! in-process event-driven simulator ([`sim::Simulator`]) with behavioural
//! models of the designs it knows how to verify.

pub mod config;
pub mod driver;
mod error;
pub mod executor;
mod junit;
pub mod model;
pub mod monitor;
pub mod pipeline;
pub mod prelude;
pub mod scoreboard;
pub mod sequence;
mod shared;
pub mod signal;
pub mod sim;
pub mod sim_if;
pub mod tb;
pub mod testbench;
pub mod time;
pub mod trigger;
pub mod utils;
pub mod value;

pub use error::{HarnessError, HarnessResult, MismatchReport};
pub use executor::{JoinHandle, Task};
pub use shared::Shared;

use std::cell::RefCell;
use std::future::Future;

use test::TestReport;

thread_local! {
    static CURRENT_TEST: RefCell<Option<Shared<TestReport>>> = RefCell::new(None);
}

pub(crate) fn begin_test(report: Shared<TestReport>) {
    CURRENT_TEST.with(|c| *c.borrow_mut() = Some(report));
}

fn take_current_test() -> Option<Shared<TestReport>> {
    CURRENT_TEST.with(|c| c.borrow_mut().take())
}

/// True while a test is running and has no verdict yet.
pub fn test_pending() -> bool {
    CURRENT_TEST.with(|c| c.borrow().is_some())
}

pub fn pass_test(msg: &str) {
    // Passes test that has not already failed/passed
    if let Some(test) = take_current_test() {
        test.get_mut().set_result(Ok(msg.to_string()));
        tear_down_test();
    }
}

pub fn fail_test(err: HarnessError) {
    // Fails test that has not already failed/passed
    if let Some(test) = take_current_test() {
        tracing::error!(test = %test.get().name, error = %err, "test failed");
        test.get_mut().set_result(Err(err));
        tear_down_test();
    }
}

fn tear_down_test() {
    trigger::cancel_all_triggers();
    executor::clear_tasks();
}

/// Spawns a task whose error fails the running test.
/// The handle resolves to `None` if the task failed.
pub fn spawn_supervised<T: 'static>(
    name: &str,
    future: impl Future<Output = HarnessResult<T>> + 'static,
) -> JoinHandle<Option<T>> {
    let task_name = name.to_string();
    Task::spawn_from_future(
        async move {
            match future.await {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::debug!(task = %task_name, "task returned an error");
                    fail_test(err);
                    None
                }
            }
        },
        name,
    )
}
