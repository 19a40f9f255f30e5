//! One verification pipeline, generic over how items are driven and how the
//! expected output is computed:
//!
//! ```text
//! Generator -> Driver -> design -> Monitor -> Predictor -> Scoreboard
//!                                     |                        ^
//!                                     +--- settled output -----+
//! ```

use futures::StreamExt;
use futures_channel::mpsc;
use num_format::{Locale, ToFormattedString};
use std::fmt;

use crate::config::{HarnessConfig, RunLength};
use crate::driver::{DrivePattern, Driver};
use crate::model::{Predictor, ReferenceModel};
use crate::monitor::{Monitor, Probe};
use crate::prelude::*;
use crate::scoreboard::Scoreboard;
use crate::sequence::{sequencer, Generator};
use crate::testbench::clock;
use crate::utils::clock_cycles;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub items: u64,
    pub checks: u64,
    pub cycles: u64,
    pub end_time_ps: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} checks passed over {} cycles, {} items driven, finished at {} ps",
            self.checks.to_formatted_string(&Locale::en),
            self.cycles.to_formatted_string(&Locale::en),
            self.items.to_formatted_string(&Locale::en),
            self.end_time_ps.to_formatted_string(&Locale::en),
        )
    }
}

pub struct Pipeline<P: DrivePattern, M: ReferenceModel> {
    pub config: HarnessConfig,
    pub clock: SimObject,
    pub reset: SimObject,
    pub pattern: P,
    pub model: M,
    pub probe: Probe,
}

impl<P: DrivePattern, M: ReferenceModel> Pipeline<P, M> {
    /// Runs until the configured length is reached. Every task is forked
    /// here; the first error any of them hits fails the test and tears the
    /// rest down.
    pub async fn run(self) -> HarnessResult<RunSummary> {
        let Pipeline {
            config,
            clock: clk,
            reset,
            pattern,
            model,
            probe,
        } = self;
        config.validate()?;
        let timing = config.timing.resolve(sim_if().get_sim_precision())?;
        tracing::info!(
            period_steps = timing.period,
            cycles = timing.cycles(),
            seed = config.seed,
            length = ?config.length,
            "starting pipeline"
        );

        let (export, port) = sequencer::<P::Item>();
        let (tx, mut rx) = mpsc::channel(config.channel_depth - 1);
        let scoreboard = Scoreboard::new(probe.output);
        let stats = scoreboard.stats();
        let monitor = Monitor::new(probe);
        let cycles = monitor.cycles();
        let driver = Driver::new(pattern, reset, timing, port);
        let progress = driver.progress();

        spawn_supervised("clock", clock(clk, config.timing.clock_period));
        spawn_supervised("monitor", monitor.run(tx));
        spawn_supervised("checker", async move {
            let mut predictor = Predictor::new(model);
            while let Some(record) = rx.next().await {
                let predicted = predictor.predict(&record)?;
                scoreboard.check(&record, predicted)?;
            }
            Ok::<(), HarnessError>(())
        });

        match config.length {
            RunLength::Items(count) => {
                spawn_supervised("generator", Generator::bounded(config.seed, count).run(export));
                let driven = spawn_supervised("driver", driver.run()).await?;
                driven.ok_or_else(|| HarnessError::Cancelled {
                    task: "driver".to_string(),
                })?;
                // let the last item's edge be sampled and checked
                clk.rising_edge().await;
            }
            RunLength::Duration => {
                spawn_supervised("generator", Generator::new(config.seed).run(export));
                spawn_supervised("driver", driver.run());
                Trigger::timer_steps(timing.reset + timing.settle).await;
                clock_cycles(clk, timing.cycles()).await;
            }
        }
        // past the read-only phase of the last edge
        Trigger::timer_steps(1).await;

        let stats = stats.snapshot();
        if stats.checks == 0 {
            return Err(HarnessError::NoChecks);
        }
        let summary = RunSummary {
            items: *progress.get(),
            checks: stats.checks,
            cycles: *cycles.get(),
            end_time_ps: sim_if().get_sim_time_ps(),
        };
        tracing::info!(%summary, "pipeline done");
        Ok(summary)
    }
}
