//! Project manifest loading.
//!
//! The manifest is a TOML file at the project root. Loading only parses and
//! checks field-level shape; graph validation lives in [`crate::graph`].

mod types;

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

pub use types::*;

/// Errors that can occur when loading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse manifest {path}: {message}")]
  Parse { path: String, message: String },

  #[error("manifest {path} declares no modules")]
  NoModules { path: String },
}

impl ProjectManifest {
  /// Parse a manifest from TOML text.
  pub fn from_toml(content: &str, origin: &str) -> Result<Self, ManifestError> {
    let manifest: ProjectManifest = toml::from_str(content).map_err(|e| ManifestError::Parse {
      path: origin.to_string(),
      message: e.to_string(),
    })?;

    if manifest.modules.is_empty() {
      return Err(ManifestError::NoModules {
        path: origin.to_string(),
      });
    }

    Ok(manifest)
  }
}

impl Project {
  /// Load a project from its manifest path. The project root is the manifest's directory.
  pub fn load(manifest_path: &Path) -> Result<Self, ManifestError> {
    let content = fs::read_to_string(manifest_path).map_err(|source| ManifestError::Read {
      path: manifest_path.display().to_string(),
      source,
    })?;
    let manifest = ProjectManifest::from_toml(&content, &manifest_path.display().to_string())?;

    let root = manifest_path
      .parent()
      .filter(|p| !p.as_os_str().is_empty())
      .unwrap_or_else(|| Path::new("."))
      .to_path_buf();

    debug!(root = %root.display(), modules = manifest.modules.len(), "loaded project manifest");
    Ok(Project::new(root, manifest))
  }
}
