//! The stages of a build.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::context::{BuildContext, CoverageOutcome};
use super::{BuildState, Stage, StageError};
use crate::audit::{AuditError, audits_for, run_audits};
use crate::checksum::{AllowList, ChecksumVerifier};
use crate::coverage::{CoverageAggregator, ReportFormat, write_report};
use crate::execute::{ExecuteConfig, execute_modules};
use crate::graph::ModuleGraph;
use crate::release::{AuditStatus, ReleasePackager};

fn task_error(e: tokio::task::JoinError) -> StageError {
  StageError::Task(e.to_string())
}

/// Loads the module graph and surfaces configuration warnings.
pub struct InitStage;

#[async_trait]
impl Stage for InitStage {
  fn state(&self) -> BuildState {
    BuildState::Init
  }

  async fn run(&self, ctx: &mut BuildContext) -> Result<(), StageError> {
    for warning in &ctx.config.warnings {
      warn!(warning = %warning, "property ignored");
      ctx.warnings.push(warning.to_string());
    }

    let graph = ModuleGraph::load(&ctx.project.manifest.modules)?;
    info!(
      project = %ctx.project.manifest.project.name,
      version = %ctx.version(),
      modules = graph.len(),
      "project loaded"
    );
    ctx.graph = Some(graph);
    Ok(())
  }
}

/// Asks the resolver for the artifacts the build will use.
pub struct ResolveDependenciesStage;

#[async_trait]
impl Stage for ResolveDependenciesStage {
  fn state(&self) -> BuildState {
    BuildState::ResolveDependencies
  }

  async fn run(&self, ctx: &mut BuildContext) -> Result<(), StageError> {
    let resolver = ctx.resolver.clone();
    let artifacts = tokio::task::spawn_blocking(move || resolver.resolve())
      .await
      .map_err(task_error)??;
    info!(artifacts = artifacts.len(), "artifacts resolved");
    ctx.artifacts = artifacts;
    Ok(())
  }
}

/// Digests every resolved artifact against the allow-list.
///
/// Runs to completion before any module is built. A missing allow-list is an
/// error even when there is nothing to verify.
pub struct VerifyChecksumsStage;

#[async_trait]
impl Stage for VerifyChecksumsStage {
  fn state(&self) -> BuildState {
    BuildState::VerifyChecksums
  }

  async fn run(&self, ctx: &mut BuildContext) -> Result<(), StageError> {
    let path = ctx.project.allowlist_path();
    let artifacts = std::mem::take(&mut ctx.artifacts);

    let (allow_list, trusted) = tokio::task::spawn_blocking(move || {
      let allow_list = AllowList::load(&path)?;
      let trusted = ChecksumVerifier::new(&allow_list).verify(artifacts)?;
      Ok::<_, StageError>((allow_list, trusted))
    })
    .await
    .map_err(task_error)??;

    info!(trusted = trusted.len(), allow_list = allow_list.len(), "checksums verified");
    ctx.allow_list = Some(Arc::new(allow_list));
    ctx.artifacts = trusted;
    Ok(())
  }
}

/// Builds every module through the worker pool.
pub struct BuildModulesStage;

#[async_trait]
impl Stage for BuildModulesStage {
  fn state(&self) -> BuildState {
    BuildState::BuildModules
  }

  async fn run(&self, ctx: &mut BuildContext) -> Result<(), StageError> {
    let config = ExecuteConfig::from(ctx.config.as_ref());
    let report = execute_modules(
      &ctx.project.manifest.modules,
      ctx.graph()?,
      ctx.runner.clone(),
      &config,
    )
    .await;

    for (name, build) in report.built() {
      for warning in &build.warnings {
        ctx.warnings.push(format!("{}: {}", name, warning));
      }
    }

    let failure = report.failure();
    ctx.build = Some(report);
    match failure {
      Some(err) => Err(err.into()),
      None => Ok(()),
    }
  }
}

/// Merges module coverage traces into one report.
#[derive(Debug, Default)]
pub struct CoverageStage {
  always: bool,
}

impl CoverageStage {
  /// Runs even when coverage is not enabled in the configuration.
  pub fn always() -> Self {
    Self { always: true }
  }
}

#[async_trait]
impl Stage for CoverageStage {
  fn state(&self) -> BuildState {
    BuildState::CoverageMerge
  }

  fn enabled(&self, ctx: &BuildContext) -> bool {
    self.always || ctx.config.coverage
  }

  async fn run(&self, ctx: &mut BuildContext) -> Result<(), StageError> {
    let modules = ctx.modules_in_order()?;
    let modules: Vec<&str> = modules.iter().map(String::as_str).collect();
    let inputs = CoverageAggregator::inputs_for(&ctx.project, &modules);

    let aggregator = CoverageAggregator::new(&ctx.project.manifest.coverage.includes)?;
    let aggregate = aggregator.aggregate(inputs).await?;
    for missing in &aggregate.missing {
      ctx.warnings.push(missing.to_string());
    }

    let format = ReportFormat::for_humans(ctx.config.reports_for_humans());
    let path = write_report(&aggregate.report, &ctx.project.coverage_report_dir(), format).await?;
    info!(path = %path.display(), "coverage report written");
    ctx.coverage = Some(CoverageOutcome {
      report: aggregate.report,
      path,
    });
    Ok(())
  }
}

/// Runs the configured audits. Any finding aborts the build before packaging.
///
/// The gate only guards packaging, so it is skipped along with the package
/// stage under `skipDist`.
#[derive(Debug, Default)]
pub struct AuditStage {
  always: bool,
}

impl AuditStage {
  /// Runs even when `skipDist` is set, for pipelines that always package.
  pub fn always() -> Self {
    Self { always: true }
  }
}

#[async_trait]
impl Stage for AuditStage {
  fn state(&self) -> BuildState {
    BuildState::Audit
  }

  fn enabled(&self, ctx: &BuildContext) -> bool {
    !ctx.config.skip_audit && ctx.project.manifest.audit.is_some() && (self.always || !ctx.config.skip_dist)
  }

  async fn run(&self, ctx: &mut BuildContext) -> Result<(), StageError> {
    let audits = audits_for(&ctx.project)?;
    match run_audits(&audits, &ctx.project.root).await {
      Ok(report) => {
        info!(checked = report.checked, "audit passed");
        ctx.audit = AuditStatus::Passed;
        Ok(())
      }
      Err(AuditError::Violation(violation)) => {
        ctx.audit = AuditStatus::Failed(violation.findings.len());
        Err(AuditError::Violation(violation).into())
      }
      Err(e) => Err(e.into()),
    }
  }
}

/// Writes the binary and source distributions.
#[derive(Debug, Default)]
pub struct PackageStage {
  always: bool,
}

impl PackageStage {
  /// Runs even when `skipDist` is set.
  pub fn always() -> Self {
    Self { always: true }
  }
}

#[async_trait]
impl Stage for PackageStage {
  fn state(&self) -> BuildState {
    BuildState::Package
  }

  fn enabled(&self, ctx: &BuildContext) -> bool {
    self.always || !ctx.config.skip_dist
  }

  async fn run(&self, ctx: &mut BuildContext) -> Result<(), StageError> {
    let modules = ctx.modules_in_order()?;
    let packager = ReleasePackager::new(ctx.project.clone(), &ctx.version());
    let audit = ctx.audit;

    let artifacts = tokio::task::spawn_blocking(move || packager.package(&modules, audit))
      .await
      .map_err(task_error)??;
    ctx.release = artifacts;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::BuildConfig;
  use crate::manifest::{AuditSection, ModuleDecl, Project, ProjectManifest};
  use crate::pipeline::{Pipeline, StageStatus};
  use crate::release::ReleaseError;
  use crate::util::testutil::{exit_cmd, write_file};
  use std::path::Path;
  use tempfile::TempDir;

  fn project(root: &Path, audit_exit: i32) -> Project {
    write_file(&root.join("jorphan/build/out/lib/jorphan.jar"), "jorphan");
    write_file(&root.join("LICENSE"), "Apache License");
    let mut manifest = ProjectManifest::new("apache-jmeter", "5.4");
    manifest.modules.push(ModuleDecl::named("jorphan"));
    manifest.release.files = vec!["LICENSE".to_string()];
    manifest.release.source_files = vec!["LICENSE".to_string()];
    manifest.audit = Some(AuditSection {
      header: None,
      command: Some(exit_cmd(audit_exit)),
      roots: Vec::new(),
      include: Vec::new(),
      exclude: Vec::new(),
      ignore_file: None,
      header_lines: 20,
    });
    Project::new(root, manifest)
  }

  #[tokio::test]
  async fn release_only_packages_existing_outputs() {
    let temp = TempDir::new().unwrap();
    let config = BuildConfig {
      skip_dist: true,
      ..Default::default()
    };
    let mut ctx = BuildContext::new(project(temp.path(), 0), config);

    let summary = Pipeline::release_only().run(&mut ctx).await;
    assert!(summary.is_success(), "{:?}", summary.abort);
    assert_eq!(ctx.audit, AuditStatus::Passed);
    assert_eq!(ctx.release.len(), 4);
    assert!(
      temp
        .path()
        .join("build/distributions/binaries/apache-jmeter-5.4-SNAPSHOT.tgz")
        .is_file()
    );
  }

  #[tokio::test]
  async fn audit_violation_blocks_packaging() {
    let temp = TempDir::new().unwrap();
    let mut ctx = BuildContext::new(project(temp.path(), 1), BuildConfig::default());

    let summary = Pipeline::release_only().run(&mut ctx).await;
    assert_eq!(summary.state, BuildState::Aborted);
    assert_eq!(summary.status(BuildState::Audit), Some(StageStatus::Failed));
    assert_eq!(summary.status(BuildState::Package), None);
    assert_eq!(ctx.audit, AuditStatus::Failed(1));
    assert!(!temp.path().join("build/distributions").exists());
  }

  #[tokio::test]
  async fn package_stage_refuses_after_failed_audit() {
    let temp = TempDir::new().unwrap();
    let mut ctx = BuildContext::new(project(temp.path(), 0), BuildConfig::default());
    ctx.graph = Some(ModuleGraph::load(&ctx.project.manifest.modules).unwrap());
    ctx.audit = AuditStatus::Failed(3);

    let err = PackageStage::always().run(&mut ctx).await.unwrap_err();
    assert!(matches!(err, StageError::Release(ReleaseError::AuditFailed(3))));
  }

  #[test]
  fn skip_audit_disables_the_gate() {
    let temp = TempDir::new().unwrap();
    let config = BuildConfig {
      skip_audit: true,
      ..Default::default()
    };
    let ctx = BuildContext::new(project(temp.path(), 1), config);
    assert!(!AuditStage::default().enabled(&ctx));
    assert!(!AuditStage::always().enabled(&ctx));
    assert!(PackageStage::default().enabled(&ctx));
  }

  #[tokio::test]
  async fn skip_dist_skips_the_audit_with_packaging() {
    let temp = TempDir::new().unwrap();
    let config = BuildConfig {
      skip_dist: true,
      ..Default::default()
    };
    let mut ctx = BuildContext::new(project(temp.path(), 1), config);
    let pipeline = Pipeline::with_stages(vec![
      Box::new(InitStage),
      Box::new(AuditStage::default()),
      Box::new(PackageStage::default()),
    ]);

    let summary = pipeline.run(&mut ctx).await;
    assert!(summary.is_success(), "{:?}", summary.abort);
    assert_eq!(summary.status(BuildState::Audit), Some(StageStatus::Skipped));
    assert_eq!(summary.status(BuildState::Package), Some(StageStatus::Skipped));
    assert_eq!(ctx.audit, AuditStatus::Skipped);
  }

  #[test]
  fn coverage_stage_needs_the_flag_unless_forced() {
    let temp = TempDir::new().unwrap();
    let ctx = BuildContext::new(project(temp.path(), 0), BuildConfig::default());
    assert!(!CoverageStage::default().enabled(&ctx));
    assert!(CoverageStage::always().enabled(&ctx));
  }
}
