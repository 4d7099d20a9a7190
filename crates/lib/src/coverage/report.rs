//! Rendering and writing the merged coverage report.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{CoverageError, CoverageReport};

/// Output variant of the coverage report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
  /// Aligned text table for people.
  Text,
  /// JSON for CI tooling.
  Json,
}

impl ReportFormat {
  /// Text for interactive runs, JSON otherwise.
  pub fn for_humans(humans: bool) -> Self {
    if humans { ReportFormat::Text } else { ReportFormat::Json }
  }

  pub fn file_name(&self) -> &'static str {
    match self {
      ReportFormat::Text => "coverage.txt",
      ReportFormat::Json => "coverage.json",
    }
  }
}

/// Line coverage of one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
  pub source: String,
  pub covered: usize,
  pub total: usize,
}

impl SourceSummary {
  pub fn percent(&self) -> f64 {
    if self.total == 0 {
      0.0
    } else {
      self.covered as f64 * 100.0 / self.total as f64
    }
  }
}

impl CoverageReport {
  /// Per-source summaries, sorted by source.
  pub fn summaries(&self) -> Vec<SourceSummary> {
    let mut by_source: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for (location, count) in &self.counts {
      let entry = by_source.entry(location.source.as_str()).or_default();
      entry.1 += 1;
      if *count > 0 {
        entry.0 += 1;
      }
    }
    by_source
      .into_iter()
      .map(|(source, (covered, total))| SourceSummary {
        source: source.to_string(),
        covered,
        total,
      })
      .collect()
  }

  /// Totals over every source.
  pub fn totals(&self) -> SourceSummary {
    SourceSummary {
      source: "TOTAL".to_string(),
      covered: self.counts.values().filter(|c| **c > 0).count(),
      total: self.counts.len(),
    }
  }
}

pub fn render_text(report: &CoverageReport) -> String {
  let summaries = report.summaries();
  let totals = report.totals();
  let width = summaries
    .iter()
    .map(|s| s.source.len())
    .chain(std::iter::once(totals.source.len()))
    .max()
    .unwrap_or(0);

  let mut out = String::new();
  let mut line = |s: &SourceSummary| {
    let _ = writeln!(
      out,
      "{:<width$}  {:>6}/{:<6} {:>6.1}%",
      s.source,
      s.covered,
      s.total,
      s.percent(),
      width = width
    );
  };
  for summary in &summaries {
    line(summary);
  }
  line(&totals);
  out
}

#[derive(Serialize)]
struct JsonReport<'a> {
  modules: &'a [String],
  totals: SourceSummary,
  sources: Vec<SourceSummary>,
  records: Vec<super::trace::TraceRecord>,
}

pub fn render_json(report: &CoverageReport) -> Result<String, serde_json::Error> {
  let json = JsonReport {
    modules: &report.modules,
    totals: report.totals(),
    sources: report.summaries(),
    records: report.records(),
  };
  serde_json::to_string_pretty(&json)
}

/// Write the report in the selected format into `dir`, returning the file written.
pub async fn write_report(report: &CoverageReport, dir: &Path, format: ReportFormat) -> Result<PathBuf, CoverageError> {
  let content = match format {
    ReportFormat::Text => render_text(report),
    ReportFormat::Json => render_json(report).map_err(|e| CoverageError::Render(e.to_string()))? + "\n",
  };

  let to_err = |source| CoverageError::Write {
    path: dir.display().to_string(),
    source,
  };
  tokio::fs::create_dir_all(dir).await.map_err(to_err)?;
  let path = dir.join(format.file_name());
  tokio::fs::write(&path, content).await.map_err(to_err)?;
  Ok(path)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::coverage::trace::{CoverageTrace, TraceRecord};
  use tempfile::TempDir;

  fn report() -> CoverageReport {
    let records = vec![
      ("org/apache/A.java", 1, 3),
      ("org/apache/A.java", 2, 0),
      ("org/apache/B.java", 9, 1),
    ]
    .into_iter()
    .map(|(source, line, count)| TraceRecord {
      source: source.to_string(),
      line,
      count,
    })
    .collect();
    let mut report = CoverageReport::default();
    report.merge(CoverageTrace::from_records("src:core", records));
    report
  }

  #[test]
  fn summaries_count_covered_lines() {
    let summaries = report().summaries();
    assert_eq!(summaries.len(), 2);
    assert_eq!((summaries[0].covered, summaries[0].total), (1, 2));
    assert_eq!(summaries[0].percent(), 50.0);
    let totals = report().totals();
    assert_eq!((totals.covered, totals.total), (2, 3));
  }

  #[test]
  fn text_report_ends_with_totals() {
    let text = render_text(&report());
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("org/apache/A.java"));
    assert!(lines[2].starts_with("TOTAL"));
    assert!(lines[2].ends_with("66.7%"));
  }

  #[test]
  fn json_report_is_parseable() {
    let json: serde_json::Value = serde_json::from_str(&render_json(&report()).unwrap()).unwrap();
    assert_eq!(json["modules"][0], "src:core");
    assert_eq!(json["totals"]["total"], 3);
    assert_eq!(json["records"].as_array().unwrap().len(), 3);
  }

  #[tokio::test]
  async fn write_report_picks_file_by_format() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("build/reports/coverage");

    let text = write_report(&report(), &dir, ReportFormat::for_humans(true)).await.unwrap();
    assert_eq!(text, dir.join("coverage.txt"));
    let json = write_report(&report(), &dir, ReportFormat::for_humans(false)).await.unwrap();
    assert_eq!(json, dir.join("coverage.json"));
    assert!(std::fs::read_to_string(json).unwrap().contains("\"records\""));
  }
}
