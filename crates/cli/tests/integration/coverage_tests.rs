//! Coverage aggregation integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn build_with_coverage_writes_text_report() {
  let env = TestEnv::from_fixture("jmeter.toml");

  env
    .modforge()
    .args(["-P", "coverage=true", "-P", "skipDist=true", "build"])
    .assert()
    .success()
    .stderr(predicate::str::contains("coverage trace missing for src:jorphan"));

  let report = std::fs::read_to_string(env.path("build/reports/coverage/coverage.txt")).unwrap();
  assert!(report.contains("org/apache/jmeter/Engine.java"));
  assert!(report.contains("TOTAL"));
}

#[test]
fn aggregate_coverage_writes_json_on_ci() {
  let env = TestEnv::from_fixture("jmeter.toml");
  env.modforge().args(["-P", "skipDist=true", "build"]).assert().success();
  env.write_file(
    "src/core/build/jacoco.json",
    r#"{"records":[{"source":"org/apache/jmeter/Engine.java","line":10,"count":1}]}"#,
  );

  env
    .modforge()
    .arg("aggregate-coverage")
    .env("CI", "true")
    .assert()
    .success()
    .stdout(predicate::str::contains("Modules: src:core"));

  let json: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(env.path("build/reports/coverage/coverage.json")).unwrap()).unwrap();
  assert_eq!(json["totals"]["covered"], 1);
}

#[test]
fn malformed_trace_fails_aggregation() {
  let env = TestEnv::from_fixture("jmeter.toml");
  env.write_file("src/jorphan/build/jacoco.json", "{ not json");

  env
    .modforge()
    .arg("aggregate-coverage")
    .assert()
    .failure()
    .stderr(predicate::str::contains("COVERAGE_MERGE failed"))
    .stderr(predicate::str::contains("src:jorphan"));
}
