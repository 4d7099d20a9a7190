//! Allow-list file management.
//!
//! The allow-list (`checksums.json`) maps SHA-512 digests of trusted artifacts
//! to a human-readable label. It is loaded once per invocation and never
//! mutated while a build runs.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "digests": {
//!     "F7040C571C2A2727F2EED4EA772F5A7C...": "gradle-enterprise-gradle-plugin-3.4.jar",
//!     "43BC9061DFDECA0C421EDF4A76E38041...": "bcpg-jdk15on-1.62.jar"
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::hash::Digest512;

/// Current allow-list format version.
pub const ALLOWLIST_VERSION: u32 = 1;

/// On-disk representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowListFile {
  pub version: u32,
  pub digests: BTreeMap<String, String>,
}

/// Errors that can occur when loading an allow-list.
#[derive(Debug, Error)]
pub enum AllowListError {
  #[error("failed to read allow-list {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse allow-list {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("unsupported allow-list version {0}, expected {ALLOWLIST_VERSION}")]
  UnsupportedVersion(u32),

  #[error("allow-list contains malformed SHA-512 digests:\n  {}", .0.join("\n  "))]
  MalformedDigests(Vec<String>),

  #[error("failed to serialize allow-list {path}: {source}")]
  Serialize {
    path: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to write allow-list {path}: {source}")]
  Write {
    path: String,
    #[source]
    source: io::Error,
  },
}

/// Immutable set of trusted digests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllowList {
  entries: BTreeMap<Digest512, String>,
}

impl AllowList {
  /// Build an allow-list from `(digest, label)` pairs.
  ///
  /// Every malformed digest is reported at once.
  pub fn from_entries<I, D, L>(entries: I) -> Result<Self, AllowListError>
  where
    I: IntoIterator<Item = (D, L)>,
    D: AsRef<str>,
    L: Into<String>,
  {
    let mut parsed = BTreeMap::new();
    let mut malformed = Vec::new();

    for (digest, label) in entries {
      match Digest512::parse(digest.as_ref()) {
        Some(d) => {
          parsed.insert(d, label.into());
        }
        None => malformed.push(format!("{} ({})", digest.as_ref(), label.into())),
      }
    }

    if !malformed.is_empty() {
      return Err(AllowListError::MalformedDigests(malformed));
    }

    Ok(Self { entries: parsed })
  }

  /// Load the allow-list from disk.
  ///
  /// A missing file is an error: an absent allow-list must not silently trust nothing
  /// and let verification be skipped.
  pub fn load(path: &Path) -> Result<Self, AllowListError> {
    let content = fs::read_to_string(path).map_err(|source| AllowListError::Read {
      path: path.display().to_string(),
      source,
    })?;

    let file: AllowListFile = serde_json::from_str(&content).map_err(|source| AllowListError::Parse {
      path: path.display().to_string(),
      source,
    })?;

    if file.version != ALLOWLIST_VERSION {
      return Err(AllowListError::UnsupportedVersion(file.version));
    }

    Self::from_entries(file.digests)
  }

  /// Write the allow-list with pretty-printed JSON.
  pub fn save(&self, path: &Path) -> Result<(), AllowListError> {
    let file = AllowListFile {
      version: ALLOWLIST_VERSION,
      digests: self.entries.iter().map(|(d, l)| (d.0.clone(), l.clone())).collect(),
    };
    let content = serde_json::to_string_pretty(&file).map_err(|source| AllowListError::Serialize {
      path: path.display().to_string(),
      source,
    })?;
    fs::write(path, content + "\n").map_err(|source| AllowListError::Write {
      path: path.display().to_string(),
      source,
    })
  }

  /// Label recorded for a trusted digest.
  pub fn label(&self, digest: &Digest512) -> Option<&str> {
    self.entries.get(digest).map(String::as_str)
  }

  pub fn contains(&self, digest: &Digest512) -> bool {
    self.entries.contains_key(digest)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// A copy of this allow-list with additional entries.
  pub fn extended<I: IntoIterator<Item = (Digest512, String)>>(&self, extra: I) -> Self {
    let mut entries = self.entries.clone();
    entries.extend(extra);
    Self { entries }
  }
}
