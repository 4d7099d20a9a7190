//! Types for module build execution.
//!
//! This module defines the error types, per-module outcomes, and the
//! aggregated report produced by the scheduler.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::{BuildConfig, FailurePolicy};

/// One step of a module build, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
  Build,
  Autostyle,
  Checkstyle,
  Test,
  Analysis,
}

impl std::fmt::Display for Step {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Step::Build => "build",
      Step::Autostyle => "autostyle",
      Step::Checkstyle => "checkstyle",
      Step::Test => "test",
      Step::Analysis => "analysis",
    };
    f.write_str(name)
  }
}

/// Errors that can occur while running a module command.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// Command exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CmdFailed { cmd: String, code: Option<i32> },

  /// Command exceeded its time limit and was killed.
  #[error("command timed out after {timeout}: {cmd}")]
  TimedOut { cmd: String, timeout: humantime::Duration },

  /// I/O error while spawning or waiting for a command.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The build task itself panicked or was cancelled.
  #[error("build task aborted: {0}")]
  TaskAborted(String),
}

/// A module whose build did not complete.
#[derive(Debug, Error)]
#[error("{step} step failed: {error}")]
pub struct ModuleFailure {
  pub step: Step,
  #[source]
  pub error: ExecuteError,
}

/// A completed module build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleBuild {
  /// Output directory of the module.
  pub outputs: PathBuf,
  /// Steps that ran, in order.
  pub steps: Vec<Step>,
  /// Non-fatal problems, such as ignored analysis failures.
  pub warnings: Vec<String>,
}

/// Final state of one module after scheduling.
#[derive(Debug)]
pub enum ModuleOutcome {
  Built(ModuleBuild),
  Failed(ModuleFailure),
  /// A (transitive) dependency failed; names the module that failed.
  Skipped { failed_dependency: String },
  /// Never started because fail-fast halted dispatching.
  NotDispatched,
}

impl ModuleOutcome {
  pub fn label(&self) -> &'static str {
    match self {
      ModuleOutcome::Built(_) => "built",
      ModuleOutcome::Failed(_) => "failed",
      ModuleOutcome::Skipped { .. } => "skipped",
      ModuleOutcome::NotDispatched => "not dispatched",
    }
  }
}

/// Result of scheduling every module of the graph.
#[derive(Debug, Default)]
pub struct BuildReport {
  /// Module names in topological build order.
  pub order: Vec<String>,
  pub outcomes: HashMap<String, ModuleOutcome>,
}

impl BuildReport {
  /// Returns true if every module was built.
  pub fn is_success(&self) -> bool {
    self.outcomes.values().all(|o| matches!(o, ModuleOutcome::Built(_)))
  }

  pub fn outcome(&self, module: &str) -> Option<&ModuleOutcome> {
    self.outcomes.get(module)
  }

  /// Built modules in build order.
  pub fn built(&self) -> Vec<(&str, &ModuleBuild)> {
    self
      .ordered()
      .filter_map(|(name, outcome)| match outcome {
        ModuleOutcome::Built(build) => Some((name, build)),
        _ => None,
      })
      .collect()
  }

  /// Failed modules in build order.
  pub fn failed(&self) -> Vec<(&str, &ModuleFailure)> {
    self
      .ordered()
      .filter_map(|(name, outcome)| match outcome {
        ModuleOutcome::Failed(failure) => Some((name, failure)),
        _ => None,
      })
      .collect()
  }

  /// Modules that did not build because of another module's failure.
  pub fn unbuilt(&self) -> Vec<&str> {
    self
      .ordered()
      .filter(|(_, o)| matches!(o, ModuleOutcome::Skipped { .. } | ModuleOutcome::NotDispatched))
      .map(|(name, _)| name)
      .collect()
  }

  fn ordered(&self) -> impl Iterator<Item = (&str, &ModuleOutcome)> {
    self
      .order
      .iter()
      .filter_map(|name| self.outcomes.get(name).map(|o| (name.as_str(), o)))
  }

  /// The aggregated error, if any module did not build.
  pub fn failure(&self) -> Option<BuildFailed> {
    if self.is_success() {
      return None;
    }
    let failures = self
      .failed()
      .into_iter()
      .map(|(name, failure)| format!("{}: {}", name, failure))
      .collect();
    let unbuilt = self.unbuilt().into_iter().map(String::from).collect();
    Some(BuildFailed { failures, unbuilt })
  }

  pub fn into_result(self) -> Result<Self, BuildFailed> {
    match self.failure() {
      Some(err) => Err(err),
      None => Ok(self),
    }
  }
}

/// One or more modules failed to build.
#[derive(Debug)]
pub struct BuildFailed {
  pub failures: Vec<String>,
  pub unbuilt: Vec<String>,
}

impl std::fmt::Display for BuildFailed {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} module(s) failed:\n  {}", self.failures.len(), self.failures.join("\n  "))?;
    if !self.unbuilt.is_empty() {
      write!(f, "\nnot built: {}", self.unbuilt.join(", "))?;
    }
    Ok(())
  }
}

impl std::error::Error for BuildFailed {}

/// Scheduling configuration.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of module builds running at once.
  pub parallelism: usize,
  pub failure_policy: FailurePolicy,
}

impl From<&BuildConfig> for ExecuteConfig {
  fn from(config: &BuildConfig) -> Self {
    Self {
      parallelism: config.parallelism.max(1),
      failure_policy: config.failure_policy,
    }
  }
}
