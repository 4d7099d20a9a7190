//! CLI smoke tests for modforge.
//!
//! These tests verify that commands parse, run without panicking and return
//! appropriate exit codes without needing a working build.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

use modforge_lib::config::ENV_VARS;

/// Get a Command for the modforge binary.
fn modforge_cmd() -> Command {
  let mut cmd = cargo_bin_cmd!("modforge");
  for var in ENV_VARS {
    cmd.env_remove(var);
  }
  cmd
}

/// Create a temp directory with a manifest.
fn temp_project(content: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("modforge.toml"), content).unwrap();
  temp
}

const MINIMAL_MANIFEST: &str = r#"
[project]
name = "demo"
version = "1.0"

[[module]]
name = "lib"

[[module]]
name = "app"
depends_on = ["lib"]
"#;

const SCOPED_MANIFEST: &str = r#"
[project]
name = "demo"
version = "1.0"

[[module]]
name = "lib"

[[module]]
name = "testkit"

[[module]]
name = "app"
depends_on = ["lib", { module = "testkit", scope = "test" }]
"#;

const CYCLIC_MANIFEST: &str = r#"
[project]
name = "demo"
version = "1.0"

[[module]]
name = "a"
depends_on = ["b"]

[[module]]
name = "b"
depends_on = ["a"]
"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  modforge_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  modforge_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("modforge"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &[
    "build",
    "verify-checksums",
    "aggregate-coverage",
    "package-release",
    "graph",
    "info",
  ] {
    modforge_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// info
// =============================================================================

#[test]
#[serial]
fn info_works_without_project() {
  let temp = TempDir::new().unwrap();

  modforge_cmd()
    .current_dir(temp.path())
    .arg("info")
    .assert()
    .success()
    .stdout(predicate::str::contains("modforge v"))
    .stdout(predicate::str::contains("skipDist"));
}

#[test]
#[serial]
fn info_reports_override_source() {
  let temp = temp_project(MINIMAL_MANIFEST);

  modforge_cmd()
    .current_dir(temp.path())
    .args(["-P", "coverage=true", "info", "--json"])
    .assert()
    .success()
    .stdout(predicate::str::contains(r#""source": "override""#))
    .stdout(predicate::str::contains(r#""version": "1.0-SNAPSHOT""#));
}

#[test]
#[serial]
fn info_warns_about_malformed_property() {
  let temp = temp_project(MINIMAL_MANIFEST);

  modforge_cmd()
    .current_dir(temp.path())
    .args(["-P", "parallelism=many", "info"])
    .assert()
    .success()
    .stderr(predicate::str::contains("parallelism"));
}

// =============================================================================
// graph
// =============================================================================

#[test]
fn graph_json_lists_waves() {
  let temp = temp_project(MINIMAL_MANIFEST);

  modforge_cmd()
    .arg("--project")
    .arg(temp.path().join("modforge.toml"))
    .args(["graph", "--json"])
    .assert()
    .success()
    .stdout(predicate::str::contains(r#""order": ["#))
    .stdout(predicate::str::contains("\"lib\""));
}

#[test]
fn graph_tags_test_scoped_dependencies() {
  let temp = temp_project(SCOPED_MANIFEST);

  modforge_cmd()
    .arg("--project")
    .arg(temp.path().join("modforge.toml"))
    .arg("graph")
    .assert()
    .success()
    .stdout(predicate::str::contains("app → lib, testkit (test)"));
}

#[test]
fn graph_cycle_fails() {
  let temp = temp_project(CYCLIC_MANIFEST);

  modforge_cmd()
    .arg("--project")
    .arg(temp.path().join("modforge.toml"))
    .arg("graph")
    .assert()
    .failure()
    .stderr(predicate::str::contains("cycle"));
}

// =============================================================================
// Error Handling
// =============================================================================

#[test]
fn missing_manifest_fails() {
  let temp = TempDir::new().unwrap();

  modforge_cmd()
    .arg("--project")
    .arg(temp.path().join("nope.toml"))
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load project"));
}

#[test]
fn invalid_manifest_fails() {
  let temp = temp_project("this is not [valid toml");

  modforge_cmd()
    .arg("--project")
    .arg(temp.path().join("modforge.toml"))
    .arg("graph")
    .assert()
    .failure();
}

#[test]
fn missing_allow_list_fails_verification() {
  let temp = temp_project(MINIMAL_MANIFEST);

  modforge_cmd()
    .arg("--project")
    .arg(temp.path().join("modforge.toml"))
    .arg("verify-checksums")
    .assert()
    .failure()
    .stderr(predicate::str::contains("VERIFY_CHECKSUMS failed"))
    .stderr(predicate::str::contains("checksums.json"));
}
