use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use std::path::Path;

use crate::test::TestReport;
use crate::{HarnessError, HarnessResult};

pub(crate) fn write_junit(suite: &str, tests: &[TestReport], path: &Path) -> HarnessResult<()> {
    let mut test_cases = Vec::new();

    for t in tests {
        let duration = Duration::seconds_f64(t.time_secs);
        let tc = match &t.result {
            Some(Ok(_)) => TestCaseBuilder::success(&t.name, duration),
            Some(Err(e)) => {
                TestCaseBuilder::failure(&t.name, duration, error_kind(e), &e.to_string())
            }
            None => TestCaseBuilder::error(&t.name, duration, "pending", "test never finished"),
        }
        .build();
        test_cases.push(tc);
    }

    let test_suite = TestSuiteBuilder::new(suite).add_testcases(test_cases).build();
    let report = ReportBuilder::new().add_testsuite(test_suite).build();
    let file = std::fs::File::create(path)
        .map_err(|e| HarnessError::Report(format!("{}: {}", path.display(), e)))?;
    report
        .write_xml(file)
        .map_err(|e| HarnessError::Report(e.to_string()))
}

fn error_kind(err: &HarnessError) -> &'static str {
    match err {
        HarnessError::Config(_) => "config",
        HarnessError::Signal { .. } => "signal",
        HarnessError::Mismatch(_) => "mismatch",
        HarnessError::Stalled { .. } => "stalled",
        HarnessError::NoChecks => "no_checks",
        HarnessError::Cancelled { .. } => "cancelled",
        HarnessError::Report(_) => "report",
    }
}
