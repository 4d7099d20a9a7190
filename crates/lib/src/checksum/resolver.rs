//! Artifact resolution.
//!
//! Dependency resolution proper is an external concern; the build only needs
//! the resolved files. [`ArtifactResolver`] is the seam, and
//! [`DirectoryResolver`] covers the common case of artifacts already
//! materialised on disk (a tool directory, a local repository mirror).

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use super::{Artifact, TrustState};
use crate::manifest::Project;

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("artifact locations do not exist:\n  {}", .0.join("\n  "))]
  NotFound(Vec<String>),

  #[error("failed to list artifacts in {path}: {message}")]
  Walk { path: String, message: String },
}

/// Supplies the set of artifacts the build is about to trust.
pub trait ArtifactResolver: Send + Sync {
  fn resolve(&self) -> Result<Vec<Artifact>, ResolveError>;
}

/// Resolves every non-directory entry of some directories plus explicit files.
///
/// Symbolic links are followed, so a linked jar is digested through its target.
#[derive(Debug, Clone, Default)]
pub struct DirectoryResolver {
  dirs: Vec<PathBuf>,
  files: Vec<PathBuf>,
}

impl DirectoryResolver {
  pub fn new(dirs: Vec<PathBuf>, files: Vec<PathBuf>) -> Self {
    Self { dirs, files }
  }

  /// Resolver for the `[artifacts]` section of a project.
  pub fn for_project(project: &Project) -> Self {
    let artifacts = &project.manifest.artifacts;
    Self::new(
      artifacts.dirs.iter().map(|d| project.resolve(d)).collect(),
      artifacts.files.iter().map(|f| project.resolve(f)).collect(),
    )
  }

  fn artifact(path: &Path) -> Artifact {
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_else(|| path.display().to_string());
    Artifact {
      name,
      path: path.to_path_buf(),
      digest: None,
      trust: TrustState::Unverified,
    }
  }
}

impl ArtifactResolver for DirectoryResolver {
  /// Artifacts sorted by name, then path.
  fn resolve(&self) -> Result<Vec<Artifact>, ResolveError> {
    let missing: Vec<String> = self
      .dirs
      .iter()
      .filter(|d| !d.is_dir())
      .chain(self.files.iter().filter(|f| !f.is_file()))
      .map(|p| p.display().to_string())
      .collect();
    if !missing.is_empty() {
      return Err(ResolveError::NotFound(missing));
    }

    let mut artifacts: Vec<Artifact> = self.files.iter().map(|f| Self::artifact(f)).collect();

    for dir in &self.dirs {
      for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        match entry {
          Ok(entry) if entry.file_type().is_dir() => {}
          // Anything else the build could open is handed to the verifier,
          // which rejects whatever is not a readable regular file.
          Ok(entry) => artifacts.push(Self::artifact(entry.path())),
          Err(e) => match e.path() {
            Some(path) if path != dir.as_path() => {
              debug!(path = %path.display(), error = %e, "unresolvable artifact entry");
              artifacts.push(Self::artifact(path));
            }
            _ => {
              return Err(ResolveError::Walk {
                path: dir.display().to_string(),
                message: e.to_string(),
              });
            }
          },
        }
      }
    }

    artifacts.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
    artifacts.dedup_by(|a, b| a.path == b.path);

    debug!(count = artifacts.len(), "resolved artifacts");
    Ok(artifacts)
  }
}
