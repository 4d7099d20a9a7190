//! Per-module coverage traces.
//!
//! # File Format
//!
//! ```json
//! {
//!   "records": [
//!     { "source": "org/apache/jmeter/engine/StandardJMeterEngine.java", "line": 42, "count": 3 }
//!   ]
//! }
//! ```
//!
//! A record may appear more than once in the same file; counts are summed.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A source location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
  pub source: String,
  pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
  pub source: String,
  pub line: u32,
  pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFile {
  #[serde(default)]
  pub records: Vec<TraceRecord>,
}

/// Execution counts recorded by one module's tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageTrace {
  pub module: String,
  pub counts: BTreeMap<Location, u64>,
}

impl CoverageTrace {
  pub fn from_records(module: &str, records: Vec<TraceRecord>) -> Self {
    let mut counts: BTreeMap<Location, u64> = BTreeMap::new();
    for record in records {
      let slot = counts
        .entry(Location {
          source: record.source,
          line: record.line,
        })
        .or_default();
      *slot = slot.saturating_add(record.count);
    }
    Self {
      module: module.to_string(),
      counts,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.counts.is_empty()
  }
}

/// Why a trace was not available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
  NotFound,
  Empty,
}

impl fmt::Display for MissingReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MissingReason::NotFound => f.write_str("no trace file"),
      MissingReason::Empty => f.write_str("empty trace file"),
    }
  }
}

/// A module produced no usable trace. Not fatal: the module is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("coverage trace missing for {module}: {reason} at {}", .path.display())]
pub struct CoverageTraceMissing {
  pub module: String,
  pub path: PathBuf,
  pub reason: MissingReason,
}

#[derive(Debug, Error)]
pub enum TraceError {
  #[error(transparent)]
  Missing(#[from] CoverageTraceMissing),

  #[error("failed to read coverage trace {path} of {module}: {source}")]
  Read {
    module: String,
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("malformed coverage trace {path} of {module}: {message}")]
  Malformed {
    module: String,
    path: String,
    message: String,
  },
}

/// Load one module's trace.
///
/// A missing file, or one containing only whitespace or no records, yields
/// [`TraceError::Missing`]. Anything that is not a valid trace is
/// [`TraceError::Malformed`].
pub async fn load_trace(module: &str, path: &Path) -> Result<CoverageTrace, TraceError> {
  let missing = |reason| {
    TraceError::Missing(CoverageTraceMissing {
      module: module.to_string(),
      path: path.to_path_buf(),
      reason,
    })
  };

  let content = match tokio::fs::read_to_string(path).await {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(missing(MissingReason::NotFound)),
    Err(source) => {
      return Err(TraceError::Read {
        module: module.to_string(),
        path: path.display().to_string(),
        source,
      });
    }
  };

  if content.trim().is_empty() {
    return Err(missing(MissingReason::Empty));
  }

  let file: TraceFile = serde_json::from_str(&content).map_err(|e| TraceError::Malformed {
    module: module.to_string(),
    path: path.display().to_string(),
    message: e.to_string(),
  })?;

  let trace = CoverageTrace::from_records(module, file.records);
  if trace.is_empty() {
    return Err(missing(MissingReason::Empty));
  }
  Ok(trace)
}
