//! Glob pattern sets used for coverage includes, audit filters and release modes.

use glob::{MatchOptions, Pattern};

/// Invalid glob pattern in the manifest or an ignore file.
#[derive(Debug, thiserror::Error)]
#[error("invalid pattern '{pattern}': {message}")]
pub struct PatternSetError {
  pub pattern: String,
  pub message: String,
}

/// A compiled list of glob patterns.
///
/// `*` matches across `/`, so `org/apache/*` covers nested paths.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
  patterns: Vec<Pattern>,
}

impl PatternSet {
  pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternSetError> {
    let patterns = patterns
      .iter()
      .map(|p| {
        Pattern::new(p.as_ref()).map_err(|e| PatternSetError {
          pattern: p.as_ref().to_string(),
          message: e.msg.to_string(),
        })
      })
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self { patterns })
  }

  pub fn is_empty(&self) -> bool {
    self.patterns.is_empty()
  }

  /// True if any pattern matches `path` (forward-slash separated).
  pub fn matches(&self, path: &str) -> bool {
    let options = MatchOptions {
      case_sensitive: true,
      require_literal_separator: false,
      require_literal_leading_dot: false,
    };
    self.patterns.iter().any(|p| p.matches_with(path, options))
  }

  /// Inclusion semantics: an empty set admits everything.
  pub fn admits(&self, path: &str) -> bool {
    self.is_empty() || self.matches(path)
  }
}

/// Read patterns from an ignore file: one per line, `#` comments and blank lines skipped.
pub fn parse_ignore_file(content: &str) -> Vec<String> {
  content
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty() && !line.starts_with('#'))
    .map(str::to_string)
    .collect()
}
