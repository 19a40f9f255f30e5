use crate::prelude::*;

/*
 * CLOCK
 */
/// Free-running clock. Starts high at the time it is forked, so the first
/// rising edge coincides with the fork, then toggles forever.
pub async fn clock(clk: SimObject, period: SimDuration) -> HarnessResult<()> {
    let period_steps = sim_if().get_sim_steps(period)?;
    let high_t = period_steps / 2;
    let low_t = period_steps - high_t;
    if period_steps % 2 != 0 {
        tracing::warn!(
            %period,
            high_steps = high_t,
            low_steps = low_t,
            "clock period not divisible by 2"
        );
    }
    loop {
        clk.write_immediate(1, 1)?;
        Trigger::timer_steps(high_t).await;
        clk.write_immediate(1, 0)?;
        Trigger::timer_steps(low_t).await;
    }
}

/*
 * RESET
 */
/// Holds `rst` high for `hold` (not necessarily a whole number of clock
/// periods), releases it, then waits `settle` so the release is not racing a
/// clock edge when stimulus starts.
pub async fn reset_sequence(rst: SimObject, hold: u64, settle: u64) -> HarnessResult<()> {
    rst.write_immediate(1, 1)?;
    Trigger::timer_steps(hold).await;
    rst.write_immediate(1, 0)?;
    Trigger::timer_steps(settle).await;
    sim_if().log(&format!("reset released on {}", rst.name()));
    Ok(())
}
