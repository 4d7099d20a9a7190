//! Release packaging integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

fn built(env: &TestEnv) {
  env.modforge().args(["-P", "skipDist=true", "build"]).assert().success();
}

#[test]
fn package_release_writes_archives_and_sidecars() {
  let env = TestEnv::from_fixture("jmeter.toml");
  built(&env);

  env
    .modforge()
    .args(["-P", "release=true", "package-release"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Packaged apache-jmeter 5.4 (4 archives)"));

  for name in [
    "binaries/apache-jmeter-5.4.tgz",
    "binaries/apache-jmeter-5.4.zip",
    "source/apache-jmeter-5.4_src.tgz",
    "source/apache-jmeter-5.4_src.zip",
  ] {
    let archive = env.path(&format!("build/distributions/{}", name));
    let sidecar = std::fs::read_to_string(format!("{}.sha512", archive.display())).unwrap();
    let digest = modforge_lib::util::hash::digest_file(&archive).unwrap();
    let file_name = archive.file_name().unwrap().to_string_lossy().to_string();
    assert_eq!(sidecar, format!("{} *{}\n", digest, file_name));
  }
}

#[test]
fn packaging_twice_is_reproducible() {
  let env = TestEnv::from_fixture("jmeter.toml");
  built(&env);
  let archive = env.path("build/distributions/binaries/apache-jmeter-5.4-SNAPSHOT.tgz");

  env.modforge().arg("package-release").assert().success();
  let first = std::fs::read(&archive).unwrap();
  std::thread::sleep(std::time::Duration::from_millis(1100));
  env.modforge().arg("package-release").assert().success();
  assert_eq!(first, std::fs::read(&archive).unwrap());
}

#[test]
fn missing_license_header_blocks_packaging() {
  let env = TestEnv::from_fixture("jmeter.toml");
  built(&env);
  env.write_file("src/core/src/main/java/Unlicensed.java", "class Unlicensed {}\n");

  env
    .modforge()
    .arg("package-release")
    .assert()
    .failure()
    .stderr(predicate::str::contains("AUDIT failed"))
    .stderr(predicate::str::contains("src/core/src/main/java/Unlicensed.java"));

  assert!(!env.exists("build/distributions"));
}

#[test]
fn skip_audit_allows_packaging() {
  let env = TestEnv::from_fixture("jmeter.toml");
  built(&env);
  env.write_file("src/core/src/main/java/Unlicensed.java", "class Unlicensed {}\n");

  env
    .modforge()
    .args(["-P", "skipAudit=true", "package-release"])
    .assert()
    .success();
}

#[test]
fn skip_dist_build_ignores_audit_findings() {
  let env = TestEnv::from_fixture("jmeter.toml");
  env.write_file("src/core/src/main/java/Unlicensed.java", "class Unlicensed {}\n");

  env
    .modforge()
    .args(["-P", "skipDist=true", "build"])
    .assert()
    .success()
    .stdout(predicate::str::contains("BUILD SUCCESSFUL"));

  assert!(!env.exists("build/distributions"));
}
