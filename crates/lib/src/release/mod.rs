//! Release packaging.
//!
//! Produces the binary and source distributions of a project:
//!
//! ```text
//! build/distributions/
//!   binaries/apache-jmeter-5.4.tgz
//!   binaries/apache-jmeter-5.4.tgz.sha512
//!   binaries/apache-jmeter-5.4.zip
//!   binaries/apache-jmeter-5.4.zip.sha512
//!   source/apache-jmeter-5.4_src.tgz
//!   ...
//! ```
//!
//! Archives are byte-for-byte reproducible: see [`archive`] for the fixed
//! metadata and [`plan`] for ordering and conflict detection. Packaging is
//! all-or-nothing; it refuses to start after a failed audit and removes any
//! archive already written if a later one fails.

pub mod archive;
pub mod plan;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use archive::{ArchiveFormat, write_archive};
pub use plan::{ArchiveEntry, ArchivePlan, EntrySource, PackagingDeterminismError, PlanBuilder};

use crate::consts::SOURCE_ARCHIVE_MARKER;
use crate::manifest::{ModuleDecl, Project};
use crate::util::hash::{Digest512, digest_file};
use crate::util::pattern::{PatternSet, PatternSetError};

/// Outcome of the audit gate as seen by the packager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
  Passed,
  /// Audit disabled or not configured.
  Skipped,
  /// Audit ran and reported this many findings.
  Failed(usize),
}

#[derive(Debug, Error)]
pub enum ReleaseError {
  #[error("packaging refused: audit reported {0} violation(s)")]
  AuditFailed(usize),

  #[error(transparent)]
  Determinism(#[from] PackagingDeterminismError),

  #[error("release inputs missing:\n  {}", .0.join("\n  "))]
  MissingInputs(Vec<String>),

  #[error("invalid release pattern: {0}")]
  Pattern(#[from] PatternSetError),

  #[error("failed to scan {path}: {message}")]
  Scan { path: String, message: String },

  #[error("failed to write {path}: {source}")]
  Write {
    path: String,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
  Binary,
  Source,
}

/// A written, checksummed archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseArtifact {
  pub kind: ArchiveKind,
  pub path: PathBuf,
  pub digest: Digest512,
}

/// Staging folder for an archive, decided by its file name.
pub fn staging_dir(file_name: &str) -> &'static str {
  if file_name.contains(SOURCE_ARCHIVE_MARKER) {
    "source"
  } else {
    "binaries"
  }
}

/// Contents of a `.sha512` sidecar.
pub fn sidecar_line(digest: &Digest512, file_name: &str) -> String {
  format!("{} *{}\n", digest, file_name)
}

fn forward_slashes(path: &Path) -> String {
  path
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

/// Builds release archives from module outputs.
#[derive(Debug, Clone)]
pub struct ReleasePackager {
  project: Arc<Project>,
  version: String,
}

impl ReleasePackager {
  /// `version` is the displayed version (snapshot suffix already applied).
  pub fn new(project: Arc<Project>, version: &str) -> Self {
    Self {
      project,
      version: version.to_string(),
    }
  }

  /// `<release name>-<version>`, also the top-level directory inside archives.
  pub fn base_name(&self) -> String {
    format!("{}-{}", self.project.manifest.release_name(), self.version)
  }

  fn patterns(&self) -> Result<(PatternSet, PatternSet), ReleaseError> {
    let release = &self.project.manifest.release;
    Ok((PatternSet::new(&release.executables)?, PatternSet::new(&release.exclude)?))
  }

  fn modules<'m>(&'m self, names: &[String]) -> Vec<&'m ModuleDecl> {
    names.iter().filter_map(|n| self.project.manifest.module(n)).collect()
  }

  fn scan_err(path: &Path) -> impl Fn(walkdir::Error) -> ReleaseError + '_ {
    move |e| ReleaseError::Scan {
      path: path.display().to_string(),
      message: e.to_string(),
    }
  }

  /// Binary distribution: outputs of every packaged module merged under the
  /// prefix, followed by the configured root files.
  pub fn binary_plan(&self, modules: &[String]) -> Result<ArchivePlan, ReleaseError> {
    let (executables, exclude) = self.patterns()?;
    let mut builder = PlanBuilder::new(&self.base_name(), &executables, &exclude);
    let mut missing = Vec::new();

    for module in self.modules(modules).into_iter().filter(|m| m.package) {
      let outputs = self.project.module_outputs(module);
      if !outputs.is_dir() {
        missing.push(format!("{}: outputs {}", module.name, outputs.display()));
        continue;
      }
      builder.add_tree("", &outputs).map_err(Self::scan_err(&outputs))?;
    }

    for file in &self.project.manifest.release.files {
      let source = self.project.resolve(file);
      if !source.exists() {
        missing.push(source.display().to_string());
        continue;
      }
      builder.add_path(file, &source).map_err(Self::scan_err(&source))?;
    }

    if !missing.is_empty() {
      return Err(ReleaseError::MissingInputs(missing));
    }
    Ok(builder.finish()?)
  }

  /// Source distribution: configured source files plus each module's source
  /// directories, at their project-relative paths.
  pub fn source_plan(&self, modules: &[String]) -> Result<ArchivePlan, ReleaseError> {
    let (executables, exclude) = self.patterns()?;
    let mut builder = PlanBuilder::new(&self.base_name(), &executables, &exclude);
    let mut missing = Vec::new();

    for file in &self.project.manifest.release.source_files {
      let source = self.project.resolve(file);
      if !source.exists() {
        missing.push(source.display().to_string());
        continue;
      }
      builder.add_path(file, &source).map_err(Self::scan_err(&source))?;
    }

    for module in self.modules(modules) {
      for dir in &module.sources {
        let relative = module.relative_dir().join(dir);
        let source = self.project.resolve(&relative);
        if !source.is_dir() {
          missing.push(format!("{}: sources {}", module.name, source.display()));
          continue;
        }
        builder.add_tree(&forward_slashes(&relative), &source).map_err(Self::scan_err(&source))?;
      }
    }

    if !missing.is_empty() {
      return Err(ReleaseError::MissingInputs(missing));
    }
    Ok(builder.finish()?)
  }

  /// Plan, write and checksum every archive.
  ///
  /// `modules` must be in topological order. Nothing is written unless the
  /// audit passed or was skipped and both plans are valid.
  pub fn package(&self, modules: &[String], audit: AuditStatus) -> Result<Vec<ReleaseArtifact>, ReleaseError> {
    if let AuditStatus::Failed(count) = audit {
      return Err(ReleaseError::AuditFailed(count));
    }

    let base = self.base_name();
    let plans = [
      (ArchiveKind::Binary, base.clone(), self.binary_plan(modules)?),
      (ArchiveKind::Source, format!("{}_src", base), self.source_plan(modules)?),
    ];

    let dist = self.project.dist_dir();
    let mut written: Vec<PathBuf> = Vec::new();
    let result = self.write_all(&dist, &plans, &mut written);
    if result.is_err() {
      for path in &written {
        if let Err(e) = fs::remove_file(path) {
          warn!(path = %path.display(), error = %e, "failed to remove partial archive");
        }
      }
    }
    result
  }

  fn write_all(
    &self,
    dist: &Path,
    plans: &[(ArchiveKind, String, ArchivePlan)],
    written: &mut Vec<PathBuf>,
  ) -> Result<Vec<ReleaseArtifact>, ReleaseError> {
    let mut artifacts = Vec::new();

    for (kind, stem, plan) in plans {
      for format in ArchiveFormat::ALL {
        let file_name = format!("{}.{}", stem, format.extension());
        let dir = dist.join(staging_dir(&file_name));
        let path = dir.join(&file_name);
        let write_err = |source| ReleaseError::Write {
          path: path.display().to_string(),
          source,
        };

        fs::create_dir_all(&dir).map_err(write_err)?;
        written.push(path.clone());
        write_archive(plan, format, &path).map_err(write_err)?;

        let digest = digest_file(&path).map_err(|e| write_err(e.source))?;
        let sidecar = dir.join(format!("{}.sha512", file_name));
        written.push(sidecar.clone());
        fs::write(&sidecar, sidecar_line(&digest, &file_name)).map_err(write_err)?;

        debug!(archive = %file_name, entries = plan.entries().len(), "archive written");
        artifacts.push(ReleaseArtifact {
          kind: *kind,
          path,
          digest,
        });
      }
    }

    info!(archives = artifacts.len(), dist = %dist.display(), "release packaged");
    Ok(artifacts)
  }
}
