//! License and attribution audit gate.
//!
//! Audits run before packaging. Every configured [`Audit`] runs to completion
//! and all findings are reported together; a single finding blocks the
//! release.

mod header;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

pub use header::HeaderAudit;

use crate::execute::ExecuteError;
use crate::execute::cmd::execute_cmd;
use crate::manifest::Project;
use crate::util::pattern::PatternSetError;

/// One offending file or check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFinding {
  pub auditor: String,
  pub subject: String,
  pub message: String,
}

impl std::fmt::Display for AuditFinding {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}] {}: {}", self.auditor, self.subject, self.message)
  }
}

/// Result of running audits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
  /// Number of files or checks inspected.
  pub checked: usize,
  pub findings: Vec<AuditFinding>,
}

impl AuditReport {
  pub fn passed(&self) -> bool {
    self.findings.is_empty()
  }

  fn absorb(&mut self, other: AuditReport) {
    self.checked += other.checked;
    self.findings.extend(other.findings);
  }
}

/// The audit reported findings; packaging must not proceed.
#[derive(Debug, Error)]
#[error(
  "audit found {} violation(s):\n  {}",
  .findings.len(),
  .findings.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("\n  ")
)]
pub struct AuditViolation {
  pub findings: Vec<AuditFinding>,
}

#[derive(Debug, Error)]
pub enum AuditError {
  #[error(transparent)]
  Violation(#[from] AuditViolation),

  #[error("invalid audit pattern: {0}")]
  Pattern(#[from] PatternSetError),

  #[error("failed to read {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("audit task failed: {0}")]
  Task(String),
}

/// A pass/fail check over the project tree.
#[async_trait]
pub trait Audit: Send + Sync {
  fn name(&self) -> &str;

  /// Inspect the project. Findings are data, not errors.
  async fn run(&self, root: &Path) -> Result<AuditReport, AuditError>;
}

/// Delegates to an external auditor; a non-zero exit is a finding.
#[derive(Debug, Clone)]
pub struct CommandAudit {
  command: String,
}

impl CommandAudit {
  pub fn new(command: impl Into<String>) -> Self {
    Self { command: command.into() }
  }
}

#[async_trait]
impl Audit for CommandAudit {
  fn name(&self) -> &str {
    "command"
  }

  async fn run(&self, root: &Path) -> Result<AuditReport, AuditError> {
    let finding = match execute_cmd(&self.command, root, &Default::default(), None).await {
      Ok(_) => None,
      Err(ExecuteError::Io(source)) => {
        return Err(AuditError::Io {
          path: root.display().to_string(),
          source,
        });
      }
      Err(e) => Some(AuditFinding {
        auditor: self.name().to_string(),
        subject: self.command.clone(),
        message: e.to_string(),
      }),
    };
    Ok(AuditReport {
      checked: 1,
      findings: finding.into_iter().collect(),
    })
  }
}

/// Audits configured by the manifest's `[audit]` section.
pub fn audits_for(project: &Project) -> Result<Vec<Box<dyn Audit>>, AuditError> {
  let Some(section) = &project.manifest.audit else {
    return Ok(Vec::new());
  };

  let mut audits: Vec<Box<dyn Audit>> = Vec::new();
  if let Some(marker) = &section.header {
    let mut exclude = section.exclude.clone();
    if let Some(ignore_file) = &section.ignore_file {
      let path: PathBuf = project.resolve(ignore_file);
      let content = std::fs::read_to_string(&path).map_err(|source| AuditError::Io {
        path: path.display().to_string(),
        source,
      })?;
      exclude.extend(crate::util::pattern::parse_ignore_file(&content));
    }
    audits.push(Box::new(HeaderAudit::new(
      marker,
      section.roots.clone(),
      &section.include,
      &exclude,
      section.header_lines,
    )?));
  }
  if let Some(command) = &section.command {
    audits.push(Box::new(CommandAudit::new(command)));
  }
  Ok(audits)
}

/// Run every audit, then fail if any reported a finding.
pub async fn run_audits(audits: &[Box<dyn Audit>], root: &Path) -> Result<AuditReport, AuditError> {
  let mut report = AuditReport::default();
  for audit in audits {
    let result = audit.run(root).await?;
    info!(
      auditor = audit.name(),
      checked = result.checked,
      findings = result.findings.len(),
      "audit finished"
    );
    report.absorb(result);
  }

  if !report.passed() {
    warn!(findings = report.findings.len(), "audit failed");
    return Err(AuditViolation {
      findings: report.findings,
    }
    .into());
  }
  Ok(report)
}
