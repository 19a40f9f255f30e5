#![allow(dead_code)]

use checkbench::pipeline::RunSummary;
use checkbench::test::{run_test, TestReport};
use checkbench::{HarnessError, HarnessResult, Shared};
use checkbench::signal::SimObject;
use checkbench::sim::Simulator;
use std::future::Future;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Runs a bench and hands back its summary next to the test report.
pub fn run_bench<F, Fut>(sim: Simulator, name: &str, bench: F) -> (TestReport, Option<RunSummary>)
where
    F: FnOnce(SimObject) -> Fut,
    Fut: Future<Output = HarnessResult<RunSummary>> + 'static,
{
    init_tracing();
    let summary = Shared::new(None);
    let out = summary.clone();
    let report = run_test(Rc::new(sim), name, move |root| {
        let bench = bench(root);
        async move {
            let s = bench.await?;
            let msg = s.to_string();
            *out.get_mut() = Some(s);
            Ok::<_, HarnessError>(msg)
        }
    });
    let summary = summary.snapshot();
    (report, summary)
}
