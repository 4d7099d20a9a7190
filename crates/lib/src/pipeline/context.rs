//! State shared by the pipeline stages of one invocation.

use std::path::PathBuf;
use std::sync::Arc;

use crate::checksum::{AllowList, Artifact, ArtifactResolver, DirectoryResolver};
use crate::config::BuildConfig;
use crate::coverage::CoverageReport;
use crate::execute::{BuildReport, ModuleRunner, ShellRunner};
use crate::graph::ModuleGraph;
use crate::manifest::Project;
use crate::release::{AuditStatus, ReleaseArtifact};

use super::{BuildState, StageError};

/// Merged coverage and where it was written.
#[derive(Debug, Clone)]
pub struct CoverageOutcome {
  pub report: CoverageReport,
  pub path: PathBuf,
}

/// Everything a stage may read or produce.
///
/// The project and configuration are immutable for the whole invocation;
/// stages only fill in their own products.
pub struct BuildContext {
  pub project: Arc<Project>,
  pub config: Arc<BuildConfig>,
  pub resolver: Arc<dyn ArtifactResolver>,
  pub runner: Arc<dyn ModuleRunner>,

  pub state: BuildState,
  pub graph: Option<ModuleGraph>,
  pub allow_list: Option<Arc<AllowList>>,
  pub artifacts: Vec<Artifact>,
  pub build: Option<BuildReport>,
  pub coverage: Option<CoverageOutcome>,
  pub audit: AuditStatus,
  pub release: Vec<ReleaseArtifact>,
  /// Non-fatal problems, in the order they were found.
  pub warnings: Vec<String>,
}

impl BuildContext {
  /// Context with the default collaborators: artifacts from the manifest's
  /// directories, module commands through the shell.
  pub fn new(project: Project, config: BuildConfig) -> Self {
    let project = Arc::new(project);
    let config = Arc::new(config);
    let resolver = Arc::new(DirectoryResolver::for_project(&project));
    let runner = Arc::new(ShellRunner::new(project.clone(), config.clone()));
    Self {
      project,
      config,
      resolver,
      runner,
      state: BuildState::Init,
      graph: None,
      allow_list: None,
      artifacts: Vec::new(),
      build: None,
      coverage: None,
      audit: AuditStatus::Skipped,
      release: Vec::new(),
      warnings: Vec::new(),
    }
  }

  pub fn with_resolver(mut self, resolver: Arc<dyn ArtifactResolver>) -> Self {
    self.resolver = resolver;
    self
  }

  pub fn with_runner(mut self, runner: Arc<dyn ModuleRunner>) -> Self {
    self.runner = runner;
    self
  }

  pub fn graph(&self) -> Result<&ModuleGraph, StageError> {
    self.graph.as_ref().ok_or(StageError::NotReady("module graph"))
  }

  /// Modules to consume downstream of the build: the built ones when the
  /// build stage ran, otherwise every module. Always in build order.
  pub fn modules_in_order(&self) -> Result<Vec<String>, StageError> {
    let graph = self.graph()?;
    Ok(
      graph
        .build_order()
        .into_iter()
        .filter(|name| match &self.build {
          Some(report) => report.built().iter().any(|(built, _)| built == name),
          None => true,
        })
        .map(String::from)
        .collect(),
    )
  }

  pub fn version(&self) -> String {
    self.config.display_version(&self.project.manifest.project.version)
  }
}
