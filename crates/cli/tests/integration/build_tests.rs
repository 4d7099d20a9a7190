//! Build command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn build_verifies_builds_and_packages() {
  let env = TestEnv::from_fixture("jmeter.toml");

  env
    .modforge()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("BUILD SUCCESSFUL: apache-jmeter 5.4-SNAPSHOT"))
    .stdout(predicate::str::contains("COVERAGE_MERGE"));

  assert!(env.exists("src/core/build/out/lib/ApacheJMeter_core.jar"));
  assert!(env.exists("build/distributions/binaries/apache-jmeter-5.4-SNAPSHOT.tgz"));
  assert!(env.exists("build/distributions/binaries/apache-jmeter-5.4-SNAPSHOT.zip.sha512"));
  assert!(env.exists("build/distributions/source/apache-jmeter-5.4-SNAPSHOT_src.tgz"));
  assert!(!env.exists("build/reports/coverage"));
}

#[test]
fn release_property_drops_snapshot_suffix() {
  let env = TestEnv::from_fixture("jmeter.toml");

  env
    .modforge()
    .args(["-P", "release=true", "-P", "skipDist=true", "build"])
    .assert()
    .success()
    .stdout(predicate::str::contains("BUILD SUCCESSFUL: apache-jmeter 5.4"))
    .stdout(predicate::str::contains("SNAPSHOT").not());

  assert!(!env.exists("build/distributions"));
}

#[test]
fn untrusted_artifact_fails_before_any_module_builds() {
  let env = TestEnv::from_fixture("jmeter.toml");
  env.write_file("tools/evil.jar", "tampered");

  env
    .modforge()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("VERIFY_CHECKSUMS failed"))
    .stderr(predicate::str::contains("evil.jar"));

  assert!(!env.exists("src/jorphan/build"));
}

#[test]
fn module_failure_names_the_module_and_skips_dependents() {
  let env = TestEnv::from_fixture("jmeter.toml");
  let manifest = std::fs::read_to_string(&env.manifest_path).unwrap();
  let broken = manifest.replacen(
    r#"echo core > "$MODFORGE_OUT/lib/ApacheJMeter_core.jar""#,
    "exit 3",
    1,
  );
  std::fs::write(&env.manifest_path, broken).unwrap();

  env
    .modforge()
    .arg("build")
    .assert()
    .failure()
    .stdout(predicate::str::contains("src:dist skipped (src:core failed)"))
    .stderr(predicate::str::contains("BUILD_MODULES failed"))
    .stderr(predicate::str::contains("src:core: build step failed"));

  assert!(!env.exists("build/distributions"));
}

#[test]
fn verify_checksums_suggests_allow_list_entries() {
  let env = TestEnv::from_fixture("jmeter.toml");
  env.write_file("tools/evil.jar", "tampered");
  let digest = modforge_lib::util::hash::digest_bytes(b"tampered");

  env
    .modforge()
    .arg("verify-checksums")
    .assert()
    .failure()
    .stdout(predicate::str::contains(format!("\"{}\": \"evil.jar\"", digest)));
}

#[test]
fn verify_checksums_update_trusts_new_artifacts() {
  let env = TestEnv::from_fixture("jmeter.toml");
  env.write_file("tools/okio-2.2.2.jar", "okio");

  env
    .modforge()
    .args(["verify-checksums", "--update"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Added 1 artifact(s)"));

  let allow_list = modforge_lib::checksum::AllowList::load(&env.path("checksums.json")).unwrap();
  assert_eq!(allow_list.len(), 2);

  env
    .modforge()
    .arg("verify-checksums")
    .assert()
    .success()
    .stdout(predicate::str::contains("2 artifact(s) trusted"));
}

#[test]
fn verify_checksums_passes_for_trusted_artifacts() {
  let env = TestEnv::from_fixture("jmeter.toml");

  env
    .modforge()
    .arg("verify-checksums")
    .assert()
    .success()
    .stdout(predicate::str::contains("1 artifact(s) trusted"));
}

#[test]
fn graph_prints_build_order() {
  let env = TestEnv::from_fixture("jmeter.toml");

  env
    .modforge()
    .arg("graph")
    .assert()
    .success()
    .stdout(predicate::str::contains("1. src:jorphan"))
    .stdout(predicate::str::contains("2. src:core → src:jorphan"))
    .stdout(predicate::str::contains("3. src:dist → src:core"));
}
