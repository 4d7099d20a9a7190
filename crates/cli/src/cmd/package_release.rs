//! Implementation of the `modforge package-release` command.
//!
//! Audits the project and packages the module outputs already on disk.
//! Packaging is forced even with `skipDist`; the audit gate still applies
//! unless `skipAudit` is set.

use anyhow::Result;

use modforge_lib::pipeline::Pipeline;

use super::{Invocation, report, run_pipeline};
use crate::output::{print_stat, print_success, truncate_hash};

pub fn cmd_package_release(invocation: &Invocation) -> Result<()> {
  let mut ctx = invocation.context()?;
  let summary = run_pipeline(&Pipeline::release_only(), &mut ctx)?;
  report(summary, &ctx)?;

  print_success(&format!(
    "Packaged {} {} ({} archives)",
    ctx.project.manifest.release_name(),
    ctx.version(),
    ctx.release.len()
  ));
  for artifact in &ctx.release {
    let name = artifact
      .path
      .strip_prefix(&ctx.project.root)
      .unwrap_or(&artifact.path)
      .display()
      .to_string();
    print_stat(&name, truncate_hash(&artifact.digest.0));
  }
  Ok(())
}
