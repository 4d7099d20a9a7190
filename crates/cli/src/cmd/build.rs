//! Implementation of the `modforge build` command.
//!
//! Runs the full pipeline: artifacts are verified before any module is built,
//! then coverage, audit and packaging run as configured.

use anyhow::Result;

use modforge_lib::execute::ModuleOutcome;
use modforge_lib::pipeline::{BuildContext, Pipeline};

use super::{Invocation, report, run_pipeline};
use crate::output::{print_info, print_stat, print_success, symbols};

pub fn cmd_build(invocation: &Invocation, verbose: bool) -> Result<()> {
  let mut ctx = invocation.context()?;
  print_info(&format!(
    "Building {} {}",
    ctx.project.manifest.project.name,
    ctx.version()
  ));

  let summary = run_pipeline(&Pipeline::standard(), &mut ctx)?;
  let success = summary.is_success();
  if verbose || !success {
    print_modules(&ctx);
  }
  report(summary, &ctx)?;

  if let Some(coverage) = &ctx.coverage {
    print_stat("Coverage report", &coverage.path.display().to_string());
  }
  for artifact in &ctx.release {
    print_stat("Archive", &artifact.path.display().to_string());
  }
  print_success(&format!(
    "BUILD SUCCESSFUL: {} {}",
    ctx.project.manifest.project.name,
    ctx.version()
  ));
  Ok(())
}

fn print_modules(ctx: &BuildContext) {
  let Some(build) = &ctx.build else {
    return;
  };
  println!();
  println!("Modules:");
  for name in &build.order {
    if let Some(outcome) = build.outcome(name) {
      let detail = match outcome {
        ModuleOutcome::Failed(failure) => format!(" ({})", failure),
        ModuleOutcome::Skipped { failed_dependency } => format!(" ({} failed)", failed_dependency),
        _ => String::new(),
      };
      println!("  {} {} {}{}", symbols::INFO, name, outcome.label(), detail);
    }
  }
  println!();
}
