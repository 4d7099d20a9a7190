//! Implementation of the `modforge verify-checksums` command.
//!
//! Resolves artifacts and checks them against the allow-list without building.
//! When artifacts are rejected, prints the allow-list entries that would admit
//! them so they can be reviewed and added by hand, or adds them directly with
//! `--update`.

use std::path::Path;

use anyhow::{Context, Result};

use modforge_lib::checksum::{AllowList, ChecksumMismatch};
use modforge_lib::pipeline::{Pipeline, StageError};

use super::{Invocation, report, run_pipeline};
use crate::output::{print_success, print_warning};

pub fn cmd_verify_checksums(invocation: &Invocation, update: bool) -> Result<()> {
  let mut ctx = invocation.context()?;
  let summary = run_pipeline(&Pipeline::verify_only(), &mut ctx)?;

  if let Some(abort) = &summary.abort
    && let StageError::Checksum(mismatch) = &abort.cause
  {
    let path = ctx.project.allowlist_path();
    if update && mismatch.suggested_entries().len() == mismatch.violations.len() {
      let added = accept(mismatch, &path)?;
      print_success(&format!("Added {} artifact(s) to {}", added, path.display()));
      return Ok(());
    }

    let suggestions = mismatch.suggested_entries();
    if !suggestions.is_empty() {
      print_warning(&format!("Review these entries before adding them to {}:", path.display()));
      for (digest, name) in suggestions {
        println!("    \"{}\": \"{}\",", digest, name);
      }
    }
  }

  report(summary, &ctx)?;
  print_success(&format!("{} artifact(s) trusted", ctx.artifacts.len()));
  Ok(())
}

/// Write the digests of every rejected artifact into the allow-list.
///
/// Only called when every violation has a digest; unreadable artifacts can
/// never be accepted.
fn accept(mismatch: &ChecksumMismatch, path: &Path) -> Result<usize> {
  let entries = mismatch.suggested_entries();
  let added = entries.len();
  let allow_list = AllowList::load(path).context("Failed to reload allow-list")?;
  allow_list
    .extended(entries)
    .save(path)
    .context("Failed to update allow-list")?;
  Ok(added)
}
