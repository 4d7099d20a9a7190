//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

use modforge_lib::checksum::AllowList;
use modforge_lib::config::ENV_VARS;
use modforge_lib::util::hash::digest_bytes;

pub const LICENSE_HEADER: &str = "/*\n * Licensed to the Apache Software Foundation (ASF)\n */\n";

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated project checkout.
pub struct TestEnv {
  pub temp: TempDir,
  pub manifest_path: PathBuf,
}

impl TestEnv {
  /// A project from a fixture manifest, with one trusted tool artifact,
  /// a license file and a licensed source file.
  pub fn from_fixture(name: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let env = Self {
      manifest_path: temp.path().join("modforge.toml"),
      temp,
    };
    env.write_file("modforge.toml", &fixture_content(name));
    env.write_file("tools/checkstyle-8.36.jar", "checkstyle");
    env.write_file("LICENSE", "Apache License 2.0\n");
    env.write_file(
      "src/core/src/main/java/Engine.java",
      &format!("{}public class Engine {{}}\n", LICENSE_HEADER),
    );
    env.trust(&[("checkstyle", "checkstyle-8.36.jar")]);
    env
  }

  pub fn root(&self) -> PathBuf {
    let p = self.temp.path().to_path_buf();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.root().join(relative)
  }

  /// Write a file relative to the project root.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Replace the allow-list with the digests of the given contents.
  pub fn trust(&self, entries: &[(&str, &str)]) {
    let allow_list = AllowList::from_entries(
      entries
        .iter()
        .map(|(content, label)| (digest_bytes(content.as_bytes()).to_string(), label.to_string())),
    )
    .unwrap();
    allow_list.save(&self.temp.path().join("checksums.json")).unwrap();
  }

  pub fn exists(&self, relative: &str) -> bool {
    self.path(relative).exists()
  }

  /// Get a Command for the modforge binary pointed at this project,
  /// with every build property cleared from the environment.
  pub fn modforge(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("modforge");
    for var in ENV_VARS {
      cmd.env_remove(var);
    }
    cmd.arg("--project").arg(&self.manifest_path);
    cmd
  }
}
