//! Layered property resolution.
//!
//! A property is looked up in three tiers, highest precedence first:
//!
//! 1. explicit per-invocation override (`-P name=value`)
//! 2. environment variable
//! 3. the supplied default
//!
//! A blank value at any tier counts as absent and falls through to the next tier.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySource {
  Override,
  Environment,
  Default,
}

impl std::fmt::Display for PropertySource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      PropertySource::Override => write!(f, "override"),
      PropertySource::Environment => write!(f, "environment"),
      PropertySource::Default => write!(f, "default"),
    }
  }
}

/// A named property with its environment variable and default.
#[derive(Debug, Clone, Copy)]
pub struct PropertyFlag<T> {
  pub name: &'static str,
  pub env: &'static str,
  pub default: T,
}

/// A resolved value together with the tier that supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
  pub value: T,
  pub source: PropertySource,
}

/// A property value that could not be parsed into its declared type.
///
/// Never fatal: the resolver logs it and falls back to the default.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid value '{value}' for property {name} ({source_tier}): {message}")]
pub struct PropertyResolutionError {
  pub name: String,
  pub value: String,
  pub source_tier: PropertySource,
  pub message: String,
}

#[derive(Debug, Clone)]
enum EnvLookup {
  Process,
  Fixed(BTreeMap<String, String>),
}

/// Resolves properties from overrides, the environment and defaults.
#[derive(Debug, Clone)]
pub struct PropertyResolver {
  overrides: BTreeMap<String, String>,
  env: EnvLookup,
}

impl PropertyResolver {
  /// Resolver backed by the process environment.
  pub fn new(overrides: BTreeMap<String, String>) -> Self {
    Self {
      overrides,
      env: EnvLookup::Process,
    }
  }

  /// Resolver backed by a fixed environment map instead of the process environment.
  pub fn with_env(overrides: BTreeMap<String, String>, env: BTreeMap<String, String>) -> Self {
    Self {
      overrides,
      env: EnvLookup::Fixed(env),
    }
  }

  /// Parse `key=value` override arguments.
  ///
  /// A bare `key` is treated as `key=true`, matching `-Pkey` on other build tools.
  pub fn parse_overrides<S: AsRef<str>>(args: &[S]) -> BTreeMap<String, String> {
    args
      .iter()
      .map(|arg| match arg.as_ref().split_once('=') {
        Some((key, value)) => (key.trim().to_string(), value.to_string()),
        None => (arg.as_ref().trim().to_string(), "true".to_string()),
      })
      .collect()
  }

  fn env_var(&self, name: &str) -> Option<String> {
    match &self.env {
      EnvLookup::Process => std::env::var(name).ok(),
      EnvLookup::Fixed(map) => map.get(name).cloned(),
    }
  }

  /// Raw lookup: first non-blank value among override and environment.
  pub fn lookup(&self, name: &str, env: &str) -> Option<(String, PropertySource)> {
    if let Some(value) = self.overrides.get(name).filter(|v| !v.trim().is_empty()) {
      return Some((value.clone(), PropertySource::Override));
    }
    self
      .env_var(env)
      .filter(|v| !v.trim().is_empty())
      .map(|v| (v, PropertySource::Environment))
  }

  /// Resolve a string property.
  pub fn resolve(&self, name: &str, env: &str, default: &str) -> Resolved<String> {
    match self.lookup(name, env) {
      Some((value, source)) => Resolved { value, source },
      None => Resolved {
        value: default.to_string(),
        source: PropertySource::Default,
      },
    }
  }

  /// Resolve a boolean property.
  ///
  /// The literal `false` (any case) is false; any other non-blank value is true.
  pub fn resolve_bool(&self, flag: &PropertyFlag<bool>) -> Resolved<bool> {
    let resolved = match self.lookup(flag.name, flag.env) {
      Some((value, source)) => Resolved {
        value: !value.trim().eq_ignore_ascii_case("false"),
        source,
      },
      None => Resolved {
        value: flag.default,
        source: PropertySource::Default,
      },
    };
    debug!(property = flag.name, value = resolved.value, source = %resolved.source, "resolved property");
    resolved
  }

  /// Resolve a typed property, falling back to the default on parse errors.
  ///
  /// Parse failures are logged as warnings and returned alongside the value so
  /// callers can surface them in summaries.
  pub fn resolve_parsed<T, F>(
    &self,
    flag: &PropertyFlag<T>,
    parse: F,
  ) -> (Resolved<T>, Option<PropertyResolutionError>)
  where
    T: Clone,
    F: Fn(&str) -> Result<T, String>,
  {
    let Some((raw, source)) = self.lookup(flag.name, flag.env) else {
      return (
        Resolved {
          value: flag.default.clone(),
          source: PropertySource::Default,
        },
        None,
      );
    };

    match parse(raw.trim()) {
      Ok(value) => (Resolved { value, source }, None),
      Err(message) => {
        let err = PropertyResolutionError {
          name: flag.name.to_string(),
          value: raw,
          source_tier: source,
          message,
        };
        warn!(error = %err, "falling back to default");
        (
          Resolved {
            value: flag.default.clone(),
            source: PropertySource::Default,
          },
          Some(err),
        )
      }
    }
  }
}

/// Parse a positive integer.
pub fn parse_positive(raw: &str) -> Result<usize, String> {
  match raw.parse::<usize>() {
    Ok(0) => Err("must be greater than zero".to_string()),
    Ok(n) => Ok(n),
    Err(e) => Err(e.to_string()),
  }
}

/// Parse a human-friendly duration such as `2m` or `90s`.
pub fn parse_duration(raw: &str) -> Result<Option<Duration>, String> {
  humantime::parse_duration(raw).map(Some).map_err(|e| e.to_string())
}
