use crate::prelude::*;

/// Waits for `n_cycles` rising edges of `signal`.
pub async fn clock_cycles(signal: SimObject, n_cycles: u64) {
    for _ in 0..n_cycles {
        signal.rising_edge().await;
    }
}

/// Simulated time in picoseconds, for log fields.
#[inline]
pub fn now_ps() -> u64 {
    sim_if().get_sim_time_ps()
}
