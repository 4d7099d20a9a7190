//! Implementation of the `modforge aggregate-coverage` command.

use anyhow::Result;

use modforge_lib::pipeline::Pipeline;

use super::{Invocation, report, run_pipeline};
use crate::output::{print_stat, print_success};

/// Merge every module trace already on disk, whatever the `coverage` property says.
pub fn cmd_aggregate_coverage(invocation: &Invocation) -> Result<()> {
  let mut ctx = invocation.context()?;
  let summary = run_pipeline(&Pipeline::coverage_only(), &mut ctx)?;
  report(summary, &ctx)?;

  if let Some(coverage) = &ctx.coverage {
    let totals = coverage.report.totals();
    print_success(&format!("Coverage report written to {}", coverage.path.display()));
    print_stat("Modules", &coverage.report.modules.join(", "));
    print_stat(
      "Lines",
      &format!("{}/{} ({:.1}%)", totals.covered, totals.total, totals.percent()),
    );
  }
  Ok(())
}
