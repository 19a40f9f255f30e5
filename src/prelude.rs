pub use crate::executor::{JoinHandle, Task};
pub use crate::signal::SimObject;
pub use crate::sim_if::{sim_if, SimIf};
pub use crate::time::{SimDuration, TimeUnit};
pub use crate::trigger::Trigger;
pub use crate::value::BinaryValue;
pub use crate::{fail_test, pass_test, spawn_supervised};
pub use crate::{HarnessError, HarnessResult, Shared};
pub use futures::future::FutureExt;
