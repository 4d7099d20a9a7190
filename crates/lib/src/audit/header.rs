//! License header audit.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use super::{Audit, AuditError, AuditFinding, AuditReport};
use crate::util::pattern::PatternSet;

/// Requires a marker text near the top of every audited file.
#[derive(Debug, Clone)]
pub struct HeaderAudit {
  marker: String,
  roots: Vec<String>,
  include: Arc<PatternSet>,
  exclude: Arc<PatternSet>,
  header_lines: usize,
}

impl HeaderAudit {
  pub fn new<S: AsRef<str>>(
    marker: &str,
    roots: Vec<String>,
    include: &[S],
    exclude: &[S],
    header_lines: usize,
  ) -> Result<Self, AuditError> {
    Ok(Self {
      marker: marker.to_string(),
      roots,
      include: Arc::new(PatternSet::new(include)?),
      exclude: Arc::new(PatternSet::new(exclude)?),
      header_lines,
    })
  }

  /// Root-relative, forward-slash separated files selected by the filters, sorted.
  fn candidates(&self, root: &Path) -> Result<Vec<(String, PathBuf)>, AuditError> {
    let scan_roots: Vec<PathBuf> = if self.roots.is_empty() {
      vec![root.to_path_buf()]
    } else {
      self.roots.iter().map(|r| root.join(r)).collect()
    };

    let mut files = Vec::new();
    for scan_root in scan_roots {
      if !scan_root.exists() {
        continue;
      }
      for entry in WalkDir::new(&scan_root).sort_by_file_name() {
        let entry = entry.map_err(|e| AuditError::Io {
          path: scan_root.display().to_string(),
          source: e.into(),
        })?;
        if !entry.file_type().is_file() {
          continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
          continue;
        };
        let relative = relative
          .components()
          .map(|c| c.as_os_str().to_string_lossy())
          .collect::<Vec<_>>()
          .join("/");
        if self.include.admits(&relative) && !self.exclude.matches(&relative) {
          files.push((relative, entry.path().to_path_buf()));
        }
      }
    }
    files.sort();
    files.dedup();
    Ok(files)
  }

  fn has_marker(&self, path: &Path) -> Result<bool, AuditError> {
    let file = File::open(path).map_err(|source| AuditError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    for _ in 0..self.header_lines {
      buf.clear();
      let read = reader.read_until(b'\n', &mut buf).map_err(|source| AuditError::Io {
        path: path.display().to_string(),
        source,
      })?;
      if read == 0 {
        break;
      }
      if String::from_utf8_lossy(&buf).contains(&self.marker) {
        return Ok(true);
      }
    }
    Ok(false)
  }

  fn scan(&self, root: &Path) -> Result<AuditReport, AuditError> {
    let candidates = self.candidates(root)?;
    let mut report = AuditReport {
      checked: candidates.len(),
      findings: Vec::new(),
    };
    for (relative, path) in candidates {
      if !self.has_marker(&path)? {
        report.findings.push(AuditFinding {
          auditor: self.name().to_string(),
          subject: relative,
          message: format!("missing license header in first {} lines", self.header_lines),
        });
      }
    }
    debug!(checked = report.checked, findings = report.findings.len(), "header audit scanned");
    Ok(report)
  }
}

#[async_trait]
impl Audit for HeaderAudit {
  fn name(&self) -> &str {
    "header"
  }

  async fn run(&self, root: &Path) -> Result<AuditReport, AuditError> {
    let audit = self.clone();
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || audit.scan(&root))
      .await
      .map_err(|e| AuditError::Task(e.to_string()))?
  }
}
