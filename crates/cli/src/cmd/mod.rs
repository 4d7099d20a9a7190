mod aggregate_coverage;
mod build;
mod graph;
mod info;
mod package_release;
mod verify_checksums;

pub use aggregate_coverage::cmd_aggregate_coverage;
pub use build::cmd_build;
pub use graph::cmd_graph;
pub use info::cmd_info;
pub use package_release::cmd_package_release;
pub use verify_checksums::cmd_verify_checksums;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use modforge_lib::config::BuildConfig;
use modforge_lib::config::props::PropertyResolver;
use modforge_lib::manifest::Project;
use modforge_lib::pipeline::{BuildContext, BuildSummary, Pipeline};

use crate::output::{print_stages, print_warning};

/// Global arguments shared by every command.
pub struct Invocation {
  pub manifest: PathBuf,
  pub resolver: PropertyResolver,
}

impl Invocation {
  pub fn new(manifest: PathBuf, properties: &[String]) -> Self {
    Self {
      manifest,
      resolver: PropertyResolver::new(PropertyResolver::parse_overrides(properties)),
    }
  }

  pub fn project(&self) -> Result<Project> {
    debug!(manifest = %self.manifest.display(), "loading project");
    Project::load(&self.manifest).with_context(|| format!("Failed to load project {}", self.manifest.display()))
  }

  pub fn config(&self) -> BuildConfig {
    BuildConfig::resolve(&self.resolver)
  }

  pub fn context(&self) -> Result<BuildContext> {
    Ok(BuildContext::new(self.project()?, self.config()))
  }
}

/// Run a pipeline to completion on a fresh runtime.
pub fn run_pipeline(pipeline: &Pipeline, ctx: &mut BuildContext) -> Result<BuildSummary> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  Ok(rt.block_on(pipeline.run(ctx)))
}

/// Print the stage table and warnings, then turn an abort into an error.
pub fn report(summary: BuildSummary, ctx: &BuildContext) -> Result<()> {
  print_stages(&summary);
  for warning in &ctx.warnings {
    print_warning(warning);
  }
  summary.into_result().map(|_| ()).map_err(|abort| {
    let stage = abort.stage;
    anyhow::Error::new(abort.cause).context(format!("{} failed", stage))
  })
}
