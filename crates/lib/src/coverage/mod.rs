//! Coverage aggregation.
//!
//! Each module may leave a trace of line execution counts behind after its
//! tests. The aggregator loads every trace concurrently and merges them into a
//! single [`CoverageReport`] through one mutex-guarded accumulator.
//!
//! Merging is a union with count accumulation, so the final report does not
//! depend on the order in which modules complete.

pub mod report;
pub mod trace;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub use report::{ReportFormat, render_json, render_text, write_report};
pub use trace::{CoverageTrace, CoverageTraceMissing, Location, MissingReason, TraceError, TraceRecord, load_trace};

use crate::manifest::Project;
use crate::util::pattern::{PatternSet, PatternSetError};

#[derive(Debug, Error)]
pub enum CoverageError {
  #[error("invalid coverage include: {0}")]
  Pattern(#[from] PatternSetError),

  #[error("{} coverage trace(s) could not be used:\n  {}", .0.len(), .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n  "))]
  Traces(Vec<TraceError>),

  #[error("failed to render coverage report: {0}")]
  Render(String),

  #[error("failed to write coverage report to {path}: {source}")]
  Write {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Merged execution counts of any number of traces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
  /// Modules whose traces were merged, sorted.
  pub modules: Vec<String>,
  pub counts: BTreeMap<Location, u64>,
}

impl CoverageReport {
  /// Merge one trace into the report.
  pub fn merge(&mut self, trace: CoverageTrace) {
    self.merge_report(CoverageReport {
      modules: vec![trace.module],
      counts: trace.counts,
    });
  }

  /// Merge another report into this one.
  pub fn merge_report(&mut self, other: CoverageReport) {
    for module in other.modules {
      if let Err(pos) = self.modules.binary_search(&module) {
        self.modules.insert(pos, module);
      }
    }
    for (location, count) in other.counts {
      let slot = self.counts.entry(location).or_default();
      *slot = slot.saturating_add(count);
    }
  }

  pub fn is_empty(&self) -> bool {
    self.counts.is_empty()
  }

  /// Records in location order.
  pub fn records(&self) -> Vec<TraceRecord> {
    self
      .counts
      .iter()
      .map(|(location, count)| TraceRecord {
        source: location.source.clone(),
        line: location.line,
        count: *count,
      })
      .collect()
  }
}

/// One module's trace location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceInput {
  pub module: String,
  pub path: PathBuf,
}

/// Outcome of an aggregation: the report plus the traces that were skipped.
#[derive(Debug, Default)]
pub struct Aggregate {
  pub report: CoverageReport,
  pub missing: Vec<CoverageTraceMissing>,
}

/// Merges module traces, keeping only sources admitted by the include rules.
#[derive(Debug, Clone)]
pub struct CoverageAggregator {
  includes: Arc<PatternSet>,
}

impl CoverageAggregator {
  pub fn new<S: AsRef<str>>(includes: &[S]) -> Result<Self, CoverageError> {
    Ok(Self {
      includes: Arc::new(PatternSet::new(includes)?),
    })
  }

  /// Trace inputs of every module of a project that declares a trace, in declaration order.
  pub fn inputs_for(project: &Project, modules: &[&str]) -> Vec<TraceInput> {
    project
      .manifest
      .modules
      .iter()
      .filter(|m| modules.contains(&m.name.as_str()))
      .filter_map(|m| {
        project.module_trace(m).map(|path| TraceInput {
          module: m.name.clone(),
          path,
        })
      })
      .collect()
  }

  /// Drop locations whose source is not included.
  pub fn filter(&self, mut trace: CoverageTrace) -> CoverageTrace {
    if !self.includes.is_empty() {
      trace.counts.retain(|location, _| self.includes.matches(&location.source));
    }
    trace
  }

  /// Load and merge every input.
  ///
  /// Missing or empty traces are skipped with a warning. Any other trace
  /// problem fails the aggregation, reporting every bad trace together.
  pub async fn aggregate(&self, inputs: Vec<TraceInput>) -> Result<Aggregate, CoverageError> {
    info!(traces = inputs.len(), "aggregating coverage");

    let accumulator = Arc::new(Mutex::new(CoverageReport::default()));
    let mut join_set = JoinSet::new();

    for input in inputs {
      let accumulator = accumulator.clone();
      let aggregator = self.clone();
      join_set.spawn(async move {
        let trace = load_trace(&input.module, &input.path).await?;
        let trace = aggregator.filter(trace);
        debug!(module = %input.module, locations = trace.counts.len(), "merging trace");
        accumulator.lock().await.merge(trace);
        Ok::<_, TraceError>(())
      });
    }

    let mut missing = Vec::new();
    let mut failures = Vec::new();
    while let Some(joined) = join_set.join_next().await {
      match joined {
        Ok(Ok(())) => {}
        Ok(Err(TraceError::Missing(m))) => {
          warn!(module = %m.module, path = %m.path.display(), reason = %m.reason, "coverage trace missing, skipping");
          missing.push(m);
        }
        Ok(Err(e)) => failures.push(e),
        Err(e) => failures.push(TraceError::Read {
          module: "<task>".to_string(),
          path: String::new(),
          source: std::io::Error::other(e.to_string()),
        }),
      }
    }

    if !failures.is_empty() {
      return Err(CoverageError::Traces(failures));
    }

    missing.sort_by(|a, b| a.module.cmp(&b.module));
    let report = std::mem::take(&mut *accumulator.lock().await);
    info!(
      modules = report.modules.len(),
      locations = report.counts.len(),
      skipped = missing.len(),
      "coverage aggregated"
    );
    Ok(Aggregate { report, missing })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{trace_json, write_file};
  use tempfile::TempDir;
  use tracing_test::traced_test;

  fn trace(module: &str, records: &[(&str, u32, u64)]) -> CoverageTrace {
    CoverageTrace::from_records(
      module,
      records
        .iter()
        .map(|(s, l, c)| TraceRecord {
          source: s.to_string(),
          line: *l,
          count: *c,
        })
        .collect(),
    )
  }

  fn merged(traces: &[&CoverageTrace]) -> CoverageReport {
    let mut report = CoverageReport::default();
    for t in traces {
      report.merge((*t).clone());
    }
    report
  }

  #[test]
  fn merge_sums_shared_locations_and_passes_others_through() {
    let a = trace("a", &[("X.java", 1, 2), ("X.java", 2, 1)]);
    let b = trace("b", &[("X.java", 1, 5), ("Y.java", 3, 4)]);
    let report = merged(&[&a, &b]);

    assert_eq!(report.modules, vec!["a", "b"]);
    let records = report.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].count, 7);
    assert_eq!(records[1].count, 1);
    assert_eq!(records[2].count, 4);
  }

  #[test]
  fn merge_is_order_independent() {
    let a = trace("a", &[("X.java", 1, 2), ("Z.java", 8, 1)]);
    let b = trace("b", &[("X.java", 1, 5), ("Y.java", 3, 4)]);
    let c = trace("c", &[("Y.java", 3, 1), ("Z.java", 8, 0)]);

    let expected = merged(&[&a, &b, &c]);
    for order in [[&a, &c, &b], [&b, &a, &c], [&b, &c, &a], [&c, &a, &b], [&c, &b, &a]] {
      assert_eq!(merged(&order), expected);
    }

    // (a + b) + c == a + (b + c)
    let mut left = merged(&[&a, &b]);
    left.merge(c.clone());
    let mut right = merged(&[&a]);
    right.merge_report(merged(&[&b, &c]));
    assert_eq!(left, right);
  }

  #[test]
  fn includes_filter_sources() {
    let aggregator = CoverageAggregator::new(&["org/apache/*"]).unwrap();
    let filtered = aggregator.filter(trace("a", &[("org/apache/jmeter/A.java", 1, 1), ("com/other/B.java", 1, 1)]));
    assert_eq!(filtered.counts.len(), 1);
  }

  #[tokio::test]
  #[traced_test]
  async fn missing_trace_is_skipped_with_warning() {
    let temp = TempDir::new().unwrap();
    let core = temp.path().join("core.json");
    write_file(&core, trace_json(&[("org/apache/Core.java", 10, 3)]));

    let aggregate = CoverageAggregator::new::<&str>(&[])
      .unwrap()
      .aggregate(vec![
        TraceInput {
          module: "src:jorphan".to_string(),
          path: temp.path().join("jorphan.json"),
        },
        TraceInput {
          module: "src:core".to_string(),
          path: core,
        },
      ])
      .await
      .unwrap();

    assert_eq!(aggregate.report.modules, vec!["src:core"]);
    assert_eq!(aggregate.report.counts.len(), 1);
    assert_eq!(aggregate.missing.len(), 1);
    assert_eq!(aggregate.missing[0].module, "src:jorphan");
    assert!(logs_contain("coverage trace missing, skipping"));
  }

  #[tokio::test]
  async fn malformed_traces_are_all_reported() {
    let temp = TempDir::new().unwrap();
    let bad_a = temp.path().join("a.json");
    let bad_b = temp.path().join("b.json");
    write_file(&bad_a, "{ not json");
    write_file(&bad_b, r#"{"records": 3}"#);

    let err = CoverageAggregator::new::<&str>(&[])
      .unwrap()
      .aggregate(vec![
        TraceInput {
          module: "a".to_string(),
          path: bad_a,
        },
        TraceInput {
          module: "b".to_string(),
          path: bad_b,
        },
      ])
      .await
      .unwrap_err();

    match err {
      CoverageError::Traces(errors) => assert_eq!(errors.len(), 2),
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn no_inputs_yields_empty_report() {
    let aggregate = CoverageAggregator::new::<&str>(&[]).unwrap().aggregate(Vec::new()).await.unwrap();
    assert!(aggregate.report.is_empty());
    assert!(aggregate.missing.is_empty());
  }
}
