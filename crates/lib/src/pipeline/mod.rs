//! Build pipeline.
//!
//! A build is a fixed list of stages driven through a small state machine:
//!
//! ```text
//! INIT -> RESOLVE_DEPENDENCIES -> VERIFY_CHECKSUMS -> BUILD_MODULES
//!      -> [COVERAGE_MERGE] -> [AUDIT] -> [PACKAGE] -> DONE
//! ```
//!
//! Bracketed stages are optional and are recorded as skipped when disabled.
//! The first stage to fail moves the machine to `ABORTED`, recording which
//! stage failed and why; no later stage runs.

mod context;
mod stages;

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info};

pub use context::{BuildContext, CoverageOutcome};
pub use stages::{
  AuditStage, BuildModulesStage, CoverageStage, InitStage, PackageStage, ResolveDependenciesStage,
  VerifyChecksumsStage,
};

use crate::audit::AuditError;
use crate::checksum::{AllowListError, ChecksumMismatch, ResolveError};
use crate::coverage::CoverageError;
use crate::execute::BuildFailed;
use crate::graph::GraphError;
use crate::release::ReleaseError;

/// Pipeline states, in the order a full build visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildState {
  Init,
  ResolveDependencies,
  VerifyChecksums,
  BuildModules,
  CoverageMerge,
  Audit,
  Package,
  Done,
  Aborted,
}

impl BuildState {
  pub fn name(&self) -> &'static str {
    match self {
      BuildState::Init => "INIT",
      BuildState::ResolveDependencies => "RESOLVE_DEPENDENCIES",
      BuildState::VerifyChecksums => "VERIFY_CHECKSUMS",
      BuildState::BuildModules => "BUILD_MODULES",
      BuildState::CoverageMerge => "COVERAGE_MERGE",
      BuildState::Audit => "AUDIT",
      BuildState::Package => "PACKAGE",
      BuildState::Done => "DONE",
      BuildState::Aborted => "ABORTED",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, BuildState::Done | BuildState::Aborted)
  }

  /// Stages only move forward. Any live state may abort; terminal states are final.
  pub fn can_transition_to(&self, next: BuildState) -> bool {
    if self.is_terminal() {
      return false;
    }
    next == BuildState::Aborted || next > *self
  }
}

impl fmt::Display for BuildState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Why a stage failed.
#[derive(Debug, Error)]
pub enum StageError {
  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  AllowList(#[from] AllowListError),

  #[error(transparent)]
  Checksum(#[from] ChecksumMismatch),

  #[error(transparent)]
  Build(#[from] BuildFailed),

  #[error(transparent)]
  Coverage(#[from] CoverageError),

  #[error(transparent)]
  Audit(#[from] AuditError),

  #[error(transparent)]
  Release(#[from] ReleaseError),

  #[error("{0} is not available: the stage producing it did not run")]
  NotReady(&'static str),

  #[error("illegal transition from {from} to {to}")]
  Transition { from: BuildState, to: BuildState },

  #[error("stage task failed: {0}")]
  Task(String),
}

/// The stage that failed and its cause.
#[derive(Debug, Error)]
#[error("{stage} failed: {cause}")]
pub struct Abort {
  pub stage: BuildState,
  #[source]
  pub cause: StageError,
}

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
  /// The state the machine is in while this stage runs.
  fn state(&self) -> BuildState;

  fn name(&self) -> &'static str {
    self.state().name()
  }

  /// Optional stages return false to be skipped.
  fn enabled(&self, _ctx: &BuildContext) -> bool {
    true
  }

  async fn run(&self, ctx: &mut BuildContext) -> Result<(), StageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
  Completed,
  Skipped,
  Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
  pub state: BuildState,
  pub status: StageStatus,
  pub elapsed: Duration,
}

/// Outcome of one pipeline run. Stage products stay in the [`BuildContext`].
#[derive(Debug)]
pub struct BuildSummary {
  /// `Done` or `Aborted`.
  pub state: BuildState,
  pub stages: Vec<StageRecord>,
  pub abort: Option<Abort>,
}

impl BuildSummary {
  pub fn is_success(&self) -> bool {
    self.state == BuildState::Done
  }

  pub fn status(&self, state: BuildState) -> Option<StageStatus> {
    self.stages.iter().find(|r| r.state == state).map(|r| r.status)
  }

  pub fn into_result(self) -> Result<Vec<StageRecord>, Abort> {
    match self.abort {
      Some(abort) => Err(abort),
      None => Ok(self.stages),
    }
  }
}

/// An ordered list of stages.
pub struct Pipeline {
  stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
  /// Every stage of a full build.
  pub fn standard() -> Self {
    Self::with_stages(vec![
      Box::new(InitStage),
      Box::new(ResolveDependenciesStage),
      Box::new(VerifyChecksumsStage),
      Box::new(BuildModulesStage),
      Box::new(CoverageStage::default()),
      Box::new(AuditStage::default()),
      Box::new(PackageStage::default()),
    ])
  }

  /// Resolve and verify artifacts, nothing else.
  pub fn verify_only() -> Self {
    Self::with_stages(vec![
      Box::new(InitStage),
      Box::new(ResolveDependenciesStage),
      Box::new(VerifyChecksumsStage),
    ])
  }

  /// Merge the traces already on disk, regardless of the coverage flag.
  pub fn coverage_only() -> Self {
    Self::with_stages(vec![Box::new(InitStage), Box::new(CoverageStage::always())])
  }

  /// Audit and package the outputs already on disk, regardless of `skipDist`.
  pub fn release_only() -> Self {
    Self::with_stages(vec![
      Box::new(InitStage),
      Box::new(AuditStage::always()),
      Box::new(PackageStage::always()),
    ])
  }

  pub fn with_stages(stages: Vec<Box<dyn Stage>>) -> Self {
    Self { stages }
  }

  pub fn stage_names(&self) -> Vec<&'static str> {
    self.stages.iter().map(|s| s.name()).collect()
  }

  /// Run every stage in order, stopping at the first failure.
  pub async fn run(&self, ctx: &mut BuildContext) -> BuildSummary {
    let mut records = Vec::with_capacity(self.stages.len());
    let mut started = false;
    debug!(stages = ?self.stage_names(), "running pipeline");

    for stage in &self.stages {
      let state = stage.state();
      if !stage.enabled(ctx) {
        debug!(stage = stage.name(), "stage skipped");
        records.push(StageRecord {
          state,
          status: StageStatus::Skipped,
          elapsed: Duration::ZERO,
        });
        continue;
      }

      // The first stage may run in the state the context starts in.
      let entering = !started && ctx.state == state;
      if !entering && !ctx.state.can_transition_to(state) {
        let cause = StageError::Transition { from: ctx.state, to: state };
        return abort(ctx, records, state, cause);
      }
      ctx.state = state;
      started = true;

      info!(stage = stage.name(), "stage started");
      let start = Instant::now();
      let result = stage.run(ctx).await;
      let elapsed = start.elapsed();

      match result {
        Ok(()) => {
          info!(stage = stage.name(), elapsed_ms = elapsed.as_millis() as u64, "stage completed");
          records.push(StageRecord {
            state,
            status: StageStatus::Completed,
            elapsed,
          });
        }
        Err(cause) => {
          records.push(StageRecord {
            state,
            status: StageStatus::Failed,
            elapsed,
          });
          return abort(ctx, records, state, cause);
        }
      }
    }

    ctx.state = BuildState::Done;
    info!(stages = records.len(), warnings = ctx.warnings.len(), "build done");
    BuildSummary {
      state: BuildState::Done,
      stages: records,
      abort: None,
    }
  }
}

fn abort(ctx: &mut BuildContext, stages: Vec<StageRecord>, stage: BuildState, cause: StageError) -> BuildSummary {
  error!(stage = %stage, error = %cause, "build aborted");
  ctx.state = BuildState::Aborted;
  BuildSummary {
    state: BuildState::Aborted,
    stages,
    abort: Some(Abort { stage, cause }),
  }
}
