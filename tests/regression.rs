mod common;

use checkbench::tb;

#[test]
fn default_regression_passes_and_writes_junit() {
    common::init_tracing();
    let report = tb::regression().run();
    for t in &report.tests {
        assert!(t.passed(), "{}: {}", t.name, t.message());
    }
    assert_eq!(report.tests.len(), 4);
    let table = report.summary_table().to_string();
    assert!(table.contains("RESULT") && table.contains("crc16_ccitt"), "{}", table);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.xml");
    report.write_junit(&path).unwrap();
    let xml = std::fs::read_to_string(&path).unwrap();
    assert!(xml.contains("testsuite"));
    for name in ["simple_state_machine", "crc16_ccitt", "mux_8bit", "simple_counter"] {
        assert!(xml.contains(name), "{} missing from {}", name, xml);
    }
}
