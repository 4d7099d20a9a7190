//! Immutable build configuration.
//!
//! Every pipeline toggle is a named field on [`BuildConfig`], resolved once at
//! invocation start through the [`props::PropertyResolver`] and passed by
//! reference to every stage afterwards.

pub mod props;

use std::time::Duration;

use serde::Serialize;

use props::{PropertyFlag, PropertyResolutionError, PropertyResolver, PropertySource, parse_duration, parse_positive};

use crate::consts::SNAPSHOT_SUFFIX;

pub const CI: PropertyFlag<bool> = PropertyFlag {
  name: "CI",
  env: "CI",
  default: false,
};
pub const COVERAGE: PropertyFlag<bool> = PropertyFlag {
  name: "coverage",
  env: "MODFORGE_COVERAGE",
  default: false,
};
pub const SKIP_DIST: PropertyFlag<bool> = PropertyFlag {
  name: "skipDist",
  env: "MODFORGE_SKIP_DIST",
  default: false,
};
pub const SKIP_CHECKSTYLE: PropertyFlag<bool> = PropertyFlag {
  name: "skipCheckstyle",
  env: "MODFORGE_SKIP_CHECKSTYLE",
  default: false,
};
pub const SKIP_AUTOSTYLE: PropertyFlag<bool> = PropertyFlag {
  name: "skipAutostyle",
  env: "MODFORGE_SKIP_AUTOSTYLE",
  default: false,
};
pub const SPOTBUGS: PropertyFlag<bool> = PropertyFlag {
  name: "spotbugs",
  env: "MODFORGE_SPOTBUGS",
  default: false,
};
pub const IGNORE_SPOTBUGS_FAILURES: PropertyFlag<bool> = PropertyFlag {
  name: "ignoreSpotBugsFailures",
  env: "MODFORGE_IGNORE_SPOTBUGS_FAILURES",
  default: false,
};
pub const RELEASE: PropertyFlag<bool> = PropertyFlag {
  name: "release",
  env: "MODFORGE_RELEASE",
  default: false,
};
pub const CONTINUE: PropertyFlag<bool> = PropertyFlag {
  name: "continue",
  env: "MODFORGE_CONTINUE",
  default: false,
};
pub const SKIP_AUDIT: PropertyFlag<bool> = PropertyFlag {
  name: "skipAudit",
  env: "MODFORGE_SKIP_AUDIT",
  default: false,
};
pub const PARALLELISM_NAME: &str = "parallelism";
pub const PARALLELISM_ENV: &str = "MODFORGE_PARALLELISM";
pub const TEST_TIMEOUT: PropertyFlag<Option<Duration>> = PropertyFlag {
  name: "testTimeout",
  env: "MODFORGE_TEST_TIMEOUT",
  default: None,
};

/// Every boolean property, in display order.
pub const BOOL_FLAGS: [PropertyFlag<bool>; 10] = [
  CI,
  COVERAGE,
  SKIP_DIST,
  SKIP_CHECKSTYLE,
  SKIP_AUTOSTYLE,
  SPOTBUGS,
  IGNORE_SPOTBUGS_FAILURES,
  RELEASE,
  CONTINUE,
  SKIP_AUDIT,
];

/// Every environment variable a [`BuildConfig`] is resolved from.
pub const ENV_VARS: [&str; 12] = [
  CI.env,
  COVERAGE.env,
  SKIP_DIST.env,
  SKIP_CHECKSTYLE.env,
  SKIP_AUTOSTYLE.env,
  SPOTBUGS.env,
  IGNORE_SPOTBUGS_FAILURES.env,
  RELEASE.env,
  CONTINUE.env,
  SKIP_AUDIT.env,
  PARALLELISM_ENV,
  TEST_TIMEOUT.env,
];

/// What happens to the rest of the module graph after a module fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
  /// In-flight builds finish, nothing new is dispatched.
  FailFast,
  /// Independent modules keep building; only dependents are skipped.
  Continue,
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct BuildConfig {
  /// Non-interactive reporting (machine-readable reports).
  pub ci: bool,
  /// Collect and merge coverage traces.
  pub coverage: bool,
  /// Skip the release packaging stage.
  pub skip_dist: bool,
  pub skip_checkstyle: bool,
  pub skip_autostyle: bool,
  /// Run the static analysis command of each module.
  pub spotbugs: bool,
  /// Downgrade static analysis failures to warnings.
  pub ignore_spotbugs_failures: bool,
  /// Release build: no snapshot suffix on the version.
  pub release: bool,
  pub skip_audit: bool,
  pub failure_policy: FailurePolicy,
  /// Maximum number of module builds running at once.
  pub parallelism: usize,
  /// Upper bound for each module's test command.
  #[serde(with = "humantime_opt")]
  pub test_timeout: Option<Duration>,
  /// Typed properties that were malformed and fell back to their defaults.
  #[serde(skip)]
  pub warnings: Vec<PropertyResolutionError>,
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      ci: CI.default,
      coverage: COVERAGE.default,
      skip_dist: SKIP_DIST.default,
      skip_checkstyle: SKIP_CHECKSTYLE.default,
      skip_autostyle: SKIP_AUTOSTYLE.default,
      spotbugs: SPOTBUGS.default,
      ignore_spotbugs_failures: IGNORE_SPOTBUGS_FAILURES.default,
      release: RELEASE.default,
      skip_audit: SKIP_AUDIT.default,
      failure_policy: FailurePolicy::FailFast,
      parallelism: num_cpus(),
      test_timeout: TEST_TIMEOUT.default,
      warnings: Vec::new(),
    }
  }
}

impl BuildConfig {
  /// Resolve every field once.
  pub fn resolve(resolver: &PropertyResolver) -> Self {
    let flag = |f: &PropertyFlag<bool>| resolver.resolve_bool(f).value;
    let mut warnings = Vec::new();

    let parallelism_flag = PropertyFlag {
      name: PARALLELISM_NAME,
      env: PARALLELISM_ENV,
      default: num_cpus(),
    };
    let (parallelism, err) = resolver.resolve_parsed(&parallelism_flag, parse_positive);
    warnings.extend(err);

    let (test_timeout, err) = resolver.resolve_parsed(&TEST_TIMEOUT, parse_duration);
    warnings.extend(err);

    Self {
      ci: flag(&CI),
      coverage: flag(&COVERAGE),
      skip_dist: flag(&SKIP_DIST),
      skip_checkstyle: flag(&SKIP_CHECKSTYLE),
      skip_autostyle: flag(&SKIP_AUTOSTYLE),
      spotbugs: flag(&SPOTBUGS),
      ignore_spotbugs_failures: flag(&IGNORE_SPOTBUGS_FAILURES),
      release: flag(&RELEASE),
      skip_audit: flag(&SKIP_AUDIT),
      failure_policy: if flag(&CONTINUE) {
        FailurePolicy::Continue
      } else {
        FailurePolicy::FailFast
      },
      parallelism: parallelism.value,
      test_timeout: test_timeout.value,
      warnings,
    }
  }

  /// Human-oriented reports unless running on CI.
  pub fn reports_for_humans(&self) -> bool {
    !self.ci
  }

  /// Version string shown to users: snapshot builds carry a suffix.
  pub fn display_version(&self, version: &str) -> String {
    if self.release {
      version.to_string()
    } else {
      format!("{}{}", version, SNAPSHOT_SUFFIX)
    }
  }

  /// Flag table for the `info` command: (property, value, source).
  pub fn describe(resolver: &PropertyResolver) -> Vec<(&'static str, String, PropertySource)> {
    let mut rows: Vec<_> = BOOL_FLAGS
      .iter()
      .map(|f| {
        let r = resolver.resolve_bool(f);
        (f.name, r.value.to_string(), r.source)
      })
      .collect();

    let parallelism = resolver.resolve(PARALLELISM_NAME, PARALLELISM_ENV, &num_cpus().to_string());
    rows.push((PARALLELISM_NAME, parallelism.value, parallelism.source));
    let timeout = resolver.resolve(TEST_TIMEOUT.name, TEST_TIMEOUT.env, "none");
    rows.push((TEST_TIMEOUT.name, timeout.value, timeout.source));
    rows
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

mod humantime_opt {
  use std::time::Duration;

  use serde::Serializer;

  pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
      Some(d) => serializer.serialize_some(&humantime::format_duration(*d).to_string()),
      None => serializer.serialize_none(),
    }
  }
}
