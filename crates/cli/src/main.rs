mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use modforge_lib::consts::MANIFEST_FILENAME;

use cmd::Invocation;

/// modforge - Reproducible multi-module build orchestrator
#[derive(Parser)]
#[command(name = "modforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Path to the project manifest
  #[arg(long, global = true, default_value = MANIFEST_FILENAME)]
  project: PathBuf,

  /// Set a build property, e.g. `-P coverage=true` (repeatable)
  #[arg(short = 'P', long = "property", global = true, value_name = "NAME=VALUE")]
  properties: Vec<String>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Verify artifacts, build every module, then merge coverage, audit and package
  Build,

  /// Resolve artifacts and check them against the allow-list
  VerifyChecksums {
    /// Add the digests of rejected artifacts to the allow-list
    #[arg(long)]
    update: bool,
  },

  /// Merge the coverage traces already on disk into one report
  AggregateCoverage,

  /// Audit the project and package existing module outputs
  PackageRelease,

  /// Show the module build order
  Graph {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show version and resolved build properties
  Info {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let invocation = Invocation::new(cli.project, &cli.properties);

  match cli.command {
    Commands::Build => cmd::cmd_build(&invocation, cli.verbose),
    Commands::VerifyChecksums { update } => cmd::cmd_verify_checksums(&invocation, update),
    Commands::AggregateCoverage => cmd::cmd_aggregate_coverage(&invocation),
    Commands::PackageRelease => cmd::cmd_package_release(&invocation),
    Commands::Graph { json } => cmd::cmd_graph(&invocation, json),
    Commands::Info { json } => cmd::cmd_info(&invocation, json),
  }
}
