//! Artifact checksum verification.
//!
//! Every artifact the build is about to load is digested and looked up in the
//! [`AllowList`]. Verification is fail-closed: a single unknown digest rejects
//! the whole set, and the error names every offender so the allow-list can be
//! updated in one pass.

pub mod allowlist;
pub mod resolver;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use allowlist::{AllowList, AllowListError};
pub use resolver::{ArtifactResolver, DirectoryResolver, ResolveError};

use crate::util::hash::{Digest512, digest_file};

/// Whether an artifact may be loaded by the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustState {
  Unverified,
  Trusted,
}

/// A resolved build-time dependency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
  pub name: String,
  pub path: PathBuf,
  /// Computed during verification.
  pub digest: Option<Digest512>,
  pub trust: TrustState,
}

/// Why an artifact was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
  /// Digest is not in the allow-list.
  Unknown(Digest512),
  /// The artifact could not be read.
  Unreadable(String),
}

/// A rejected artifact as reported to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumViolation {
  pub name: String,
  pub path: PathBuf,
  pub rejection: Rejection,
}

impl fmt::Display for ChecksumViolation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.rejection {
      Rejection::Unknown(digest) => write!(f, "SHA-512({}) = {} ({})", self.name, digest, self.path.display()),
      Rejection::Unreadable(message) => write!(f, "{}: unreadable ({}): {}", self.name, self.path.display(), message),
    }
  }
}

/// One or more artifacts are not trusted.
#[derive(Debug, Error)]
#[error(
  "{} artifact(s) were not explicitly permitted:\n  {}",
  .violations.len(),
  .violations.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("\n  ")
)]
pub struct ChecksumMismatch {
  /// Sorted by artifact name, then path.
  pub violations: Vec<ChecksumViolation>,
}

impl ChecksumMismatch {
  /// Entries that would admit the unknown artifacts, as `(digest, label)` pairs.
  ///
  /// Unreadable artifacts have no digest and are left out.
  pub fn suggested_entries(&self) -> Vec<(Digest512, String)> {
    self
      .violations
      .iter()
      .filter_map(|v| match &v.rejection {
        Rejection::Unknown(digest) => Some((digest.clone(), v.name.clone())),
        Rejection::Unreadable(_) => None,
      })
      .collect()
  }
}

/// Digest an artifact that must resolve to a regular file.
fn digest_artifact(path: &Path) -> Result<Digest512, String> {
  let metadata = fs::metadata(path).map_err(|e| e.to_string())?;
  if !metadata.is_file() {
    return Err("not a regular file".to_string());
  }
  digest_file(path).map_err(|e| e.source.to_string())
}

/// Checks artifacts against an immutable allow-list.
#[derive(Debug, Clone, Copy)]
pub struct ChecksumVerifier<'a> {
  allow_list: &'a AllowList,
}

impl<'a> ChecksumVerifier<'a> {
  pub fn new(allow_list: &'a AllowList) -> Self {
    Self { allow_list }
  }

  /// Digest and check every artifact.
  ///
  /// Returns the artifacts marked [`TrustState::Trusted`] when all of them are
  /// permitted. Otherwise no artifact is returned at all.
  pub fn verify(&self, artifacts: Vec<Artifact>) -> Result<Vec<Artifact>, ChecksumMismatch> {
    let mut trusted = Vec::with_capacity(artifacts.len());
    let mut violations = Vec::new();

    for mut artifact in artifacts {
      match digest_artifact(&artifact.path) {
        Ok(digest) if self.allow_list.contains(&digest) => {
          debug!(
            artifact = %artifact.name,
            label = self.allow_list.label(&digest).unwrap_or_default(),
            "artifact trusted"
          );
          artifact.digest = Some(digest);
          artifact.trust = TrustState::Trusted;
          trusted.push(artifact);
        }
        Ok(digest) => {
          warn!(artifact = %artifact.name, digest = %digest, "artifact digest not in allow-list");
          violations.push(ChecksumViolation {
            name: artifact.name,
            path: artifact.path,
            rejection: Rejection::Unknown(digest),
          });
        }
        Err(message) => {
          warn!(artifact = %artifact.name, error = %message, "artifact could not be digested");
          violations.push(ChecksumViolation {
            name: artifact.name,
            path: artifact.path,
            rejection: Rejection::Unreadable(message),
          });
        }
      }
    }

    if !violations.is_empty() {
      violations.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
      return Err(ChecksumMismatch { violations });
    }

    info!(count = trusted.len(), "all artifacts trusted");
    Ok(trusted)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::hash::digest_bytes;
  use std::fs;
  use std::path::Path;
  use tempfile::TempDir;

  fn artifact(dir: &Path, name: &str, content: &str) -> Artifact {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    Artifact {
      name: name.to_string(),
      path,
      digest: None,
      trust: TrustState::Unverified,
    }
  }

  fn allow(contents: &[(&str, &str)]) -> AllowList {
    AllowList::from_entries(contents.iter().map(|(c, l)| (digest_bytes(c.as_bytes()).0, *l))).unwrap()
  }

  #[test]
  fn all_permitted_artifacts_become_trusted() {
    let temp = TempDir::new().unwrap();
    let artifacts = vec![
      artifact(temp.path(), "okio.jar", "okio"),
      artifact(temp.path(), "bcpg.jar", "bcpg"),
    ];
    let list = allow(&[("okio", "okio.jar"), ("bcpg", "bcpg.jar")]);

    let trusted = ChecksumVerifier::new(&list).verify(artifacts).unwrap();
    assert_eq!(trusted.len(), 2);
    assert!(trusted.iter().all(|a| a.trust == TrustState::Trusted));
    assert_eq!(trusted[0].digest, Some(digest_bytes(b"okio")));
  }

  #[test]
  fn names_exactly_the_offending_artifacts() {
    let temp = TempDir::new().unwrap();
    let artifacts = vec![
      artifact(temp.path(), "trusted.jar", "trusted"),
      artifact(temp.path(), "zeta.jar", "zeta"),
      artifact(temp.path(), "alpha.jar", "alpha"),
    ];
    let list = allow(&[("trusted", "trusted.jar")]);

    let err = ChecksumVerifier::new(&list).verify(artifacts).unwrap_err();
    let names: Vec<_> = err.violations.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["alpha.jar", "zeta.jar"]);

    let message = err.to_string();
    assert!(message.contains(&format!("SHA-512(alpha.jar) = {}", digest_bytes(b"alpha"))));
    assert!(message.contains("zeta.jar"));
    assert!(!message.contains("trusted.jar"));
  }

  #[test]
  fn unreadable_artifact_reported_with_the_others() {
    let temp = TempDir::new().unwrap();
    let missing = Artifact {
      name: "gone.jar".to_string(),
      path: temp.path().join("gone.jar"),
      digest: None,
      trust: TrustState::Unverified,
    };
    let artifacts = vec![missing, artifact(temp.path(), "new.jar", "new")];

    let err = ChecksumVerifier::new(&AllowList::default()).verify(artifacts).unwrap_err();
    assert_eq!(err.violations.len(), 2);
    assert!(matches!(err.violations[0].rejection, Rejection::Unreadable(_)));
    assert_eq!(err.suggested_entries(), vec![(digest_bytes(b"new"), "new.jar".to_string())]);
  }

  #[test]
  fn directory_posing_as_artifact_is_unreadable() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("plugin.jar");
    fs::create_dir_all(&dir).unwrap();
    let artifacts = vec![Artifact {
      name: "plugin.jar".to_string(),
      path: dir,
      digest: None,
      trust: TrustState::Unverified,
    }];

    let err = ChecksumVerifier::new(&AllowList::default()).verify(artifacts).unwrap_err();
    assert_eq!(
      err.violations[0].rejection,
      Rejection::Unreadable("not a regular file".to_string())
    );
  }

  #[test]
  fn empty_artifact_set_verifies() {
    let trusted = ChecksumVerifier::new(&AllowList::default()).verify(Vec::new()).unwrap();
    assert!(trusted.is_empty());
  }

  #[test]
  fn verification_does_not_touch_allow_list() {
    let temp = TempDir::new().unwrap();
    let list = allow(&[("a", "a.jar")]);
    let before = list.clone();
    let _ = ChecksumVerifier::new(&list).verify(vec![artifact(temp.path(), "b.jar", "b")]);
    assert_eq!(list, before);
  }
}
