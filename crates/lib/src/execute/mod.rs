//! Module build execution.
//!
//! This module provides the worker pool that builds modules in dependency
//! order. It handles:
//! - dispatching a module as soon as all of its dependencies are built
//! - capping concurrency with a semaphore
//! - failure propagation according to the [`FailurePolicy`]

pub mod cmd;
pub mod steps;
pub mod types;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::FailurePolicy;
use crate::graph::ModuleGraph;
use crate::manifest::ModuleDecl;

pub use steps::{ModuleRunner, ShellRunner};
pub use types::{
  BuildFailed, BuildReport, ExecuteConfig, ExecuteError, ModuleBuild, ModuleFailure, ModuleOutcome, Step,
};

/// Build every module of the graph.
///
/// A module is dispatched only once all of its dependencies have been built.
/// Completions are awaited through the join set, so a waiting module is woken
/// by its last dependency finishing rather than by polling.
///
/// # Failure handling
///
/// - `FailFast`: builds already running finish, nothing new is dispatched.
///   Dependents of the failed module are `Skipped`, everything else that
///   never started is `NotDispatched`.
/// - `Continue`: independent modules keep building; only modules that
///   (transitively) depend on a failed module are `Skipped`.
pub async fn execute_modules(
  modules: &[ModuleDecl],
  graph: &ModuleGraph,
  runner: Arc<dyn ModuleRunner>,
  config: &ExecuteConfig,
) -> BuildReport {
  let order: Vec<String> = graph.build_order().into_iter().map(String::from).collect();
  let position: HashMap<&str, usize> = order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
  let decls: HashMap<&str, &ModuleDecl> = modules.iter().map(|m| (m.name.as_str(), m)).collect();

  info!(module_count = order.len(), parallelism = config.parallelism, "starting module builds");

  let mut pending: HashMap<&str, usize> = HashMap::new();
  let mut ready: BTreeSet<(usize, &str)> = BTreeSet::new();
  for name in &order {
    let deps = graph.dependencies(name).map(|d| d.len()).unwrap_or_default();
    if deps == 0 {
      ready.insert((position[name.as_str()], name.as_str()));
    } else {
      pending.insert(name.as_str(), deps);
    }
  }

  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
  let mut join_set = JoinSet::new();
  let mut running: HashMap<Id, String> = HashMap::new();
  let mut outcomes: HashMap<String, ModuleOutcome> = HashMap::new();
  let mut halted = false;

  loop {
    // Dispatch as many ready modules as there are permits
    while !halted && let Some(&next) = ready.first() {
      let Ok(permit) = semaphore.clone().try_acquire_owned() else {
        break;
      };
      ready.remove(&next);
      let (_, name) = next;

      let Some(&decl) = decls.get(name) else {
        error!(module = %name, "module missing from declarations");
        continue;
      };
      let decl = decl.clone();
      let runner = runner.clone();

      debug!(module = %name, "dispatching module");
      let handle = join_set.spawn(async move {
        let _permit = permit;
        runner.run(&decl).await
      });
      running.insert(handle.id(), name.to_string());
    }

    let Some(joined) = join_set.join_next_with_id().await else {
      break;
    };

    let (name, result) = match joined {
      Ok((id, result)) => (running.remove(&id), result),
      Err(e) => (
        running.remove(&e.id()),
        Err(ModuleFailure {
          step: Step::Build,
          error: ExecuteError::TaskAborted(e.to_string()),
        }),
      ),
    };
    let Some(name) = name else {
      continue;
    };

    match result {
      Ok(build) => {
        info!(module = %name, "module built");
        for dependent in graph.dependents(&name).unwrap_or_default() {
          if let Some(count) = pending.get_mut(dependent) {
            *count -= 1;
            if *count == 0 {
              pending.remove(dependent);
              ready.insert((position[dependent], dependent));
            }
          }
        }
        outcomes.insert(name, ModuleOutcome::Built(build));
      }
      Err(failure) => {
        error!(module = %name, error = %failure, "module failed");
        for dependent in graph.transitive_dependents(&name).unwrap_or_default() {
          pending.remove(dependent);
          outcomes.entry(dependent.to_string()).or_insert_with(|| {
            warn!(module = %dependent, failed_dep = %name, "skipping module due to failed dependency");
            ModuleOutcome::Skipped {
              failed_dependency: name.clone(),
            }
          });
        }
        if config.failure_policy == FailurePolicy::FailFast && !halted {
          warn!(in_flight = join_set.len(), "halting dispatch after failure");
          halted = true;
        }
        outcomes.insert(name, ModuleOutcome::Failed(failure));
      }
    }
  }

  // Everything left was held back by fail-fast
  for name in &order {
    outcomes.entry(name.clone()).or_insert(ModuleOutcome::NotDispatched);
  }

  let report = BuildReport { order, outcomes };
  info!(
    built = report.built().len(),
    failed = report.failed().len(),
    unbuilt = report.unbuilt().len(),
    "module builds complete"
  );
  report
}
