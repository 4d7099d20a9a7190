//! Per-module build steps.
//!
//! A module build runs its configured commands in a fixed order:
//! `build`, `autostyle`, `checkstyle`, `test`, `analysis`. Which of them run
//! depends on the [`BuildConfig`] toggles, one toggle per check.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::cmd::execute_cmd;
use super::types::{ExecuteError, ModuleBuild, ModuleFailure, Step};
use crate::config::BuildConfig;
use crate::manifest::{ModuleDecl, Project};

/// Builds one module. The scheduler only decides when.
#[async_trait]
pub trait ModuleRunner: Send + Sync {
  async fn run(&self, module: &ModuleDecl) -> Result<ModuleBuild, ModuleFailure>;
}

/// Runs module commands through the platform shell.
#[derive(Debug, Clone)]
pub struct ShellRunner {
  project: Arc<Project>,
  config: Arc<BuildConfig>,
}

impl ShellRunner {
  pub fn new(project: Arc<Project>, config: Arc<BuildConfig>) -> Self {
    Self { project, config }
  }

  /// Steps that will run for a module, with their commands.
  pub fn plan<'m>(&self, module: &'m ModuleDecl) -> Vec<(Step, &'m str)> {
    let mut plan = Vec::new();
    if let Some(cmd) = &module.build {
      plan.push((Step::Build, cmd.as_str()));
    }
    if let Some(cmd) = &module.autostyle
      && !self.config.skip_autostyle
    {
      plan.push((Step::Autostyle, cmd.as_str()));
    }
    if let Some(cmd) = &module.checkstyle
      && !self.config.skip_checkstyle
    {
      plan.push((Step::Checkstyle, cmd.as_str()));
    }
    if let Some(cmd) = &module.test {
      plan.push((Step::Test, cmd.as_str()));
    }
    if let Some(cmd) = &module.analysis
      && self.config.spotbugs
    {
      plan.push((Step::Analysis, cmd.as_str()));
    }
    plan
  }

  fn environment(&self, module: &ModuleDecl) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("MODFORGE_MODULE".to_string(), module.name.clone());
    env.insert(
      "MODFORGE_OUT".to_string(),
      self.project.module_outputs(module).display().to_string(),
    );
    env.insert("MODFORGE_COVERAGE".to_string(), self.config.coverage.to_string());
    if let Some(trace) = self.project.module_trace(module) {
      env.insert("MODFORGE_TRACE".to_string(), trace.display().to_string());
    }
    env
  }

  fn timeout_for(&self, step: Step) -> Option<Duration> {
    match step {
      Step::Test => self.config.test_timeout,
      _ => None,
    }
  }
}

#[async_trait]
impl ModuleRunner for ShellRunner {
  async fn run(&self, module: &ModuleDecl) -> Result<ModuleBuild, ModuleFailure> {
    let outputs = self.project.module_outputs(module);
    tokio::fs::create_dir_all(&outputs).await.map_err(|e| ModuleFailure {
      step: Step::Build,
      error: ExecuteError::Io(e),
    })?;

    let cwd = self.project.module_dir(module);
    let env = self.environment(module);
    let mut steps = Vec::new();
    let mut warnings = Vec::new();

    for (step, cmd) in self.plan(module) {
      debug!(module = %module.name, step = %step, "running step");
      match execute_cmd(cmd, &cwd, &env, self.timeout_for(step)).await {
        Ok(_) => steps.push(step),
        Err(error) if step == Step::Analysis && self.config.ignore_spotbugs_failures => {
          warn!(module = %module.name, error = %error, "static analysis failed, ignoring");
          warnings.push(format!("{} step failed: {}", step, error));
          steps.push(step);
        }
        Err(error) => return Err(ModuleFailure { step, error }),
      }
    }

    Ok(ModuleBuild {
      outputs,
      steps,
      warnings,
    })
  }
}
