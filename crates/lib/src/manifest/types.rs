//! Project manifest types.
//!
//! The manifest (`modforge.toml`) declares the modules of a project, their
//! project-to-project dependencies, and the settings of the optional pipeline
//! stages.
//!
//! # Example
//!
//! ```toml
//! [project]
//! name = "apache-jmeter"
//! version = "5.4"
//!
//! [artifacts]
//! dirs = ["tools"]
//!
//! [[module]]
//! name = "src:jorphan"
//! build = "make jar"
//!
//! [[module]]
//! name = "src:core"
//! depends_on = ["src:jorphan", { module = "src:jorphan", scope = "test" }]
//! trace = "build/coverage/test.json"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::ALLOWLIST_FILENAME;

fn default_outputs() -> String {
  "build/out".to_string()
}

fn default_true() -> bool {
  true
}

fn default_report_dir() -> String {
  "build/reports/coverage".to_string()
}

fn default_dist_dir() -> String {
  "build/distributions".to_string()
}

fn default_allowlist() -> String {
  ALLOWLIST_FILENAME.to_string()
}

fn default_audit_include() -> Vec<String> {
  vec!["**/*".to_string()]
}

fn default_header_lines() -> usize {
  20
}

/// The complete project manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
  pub project: ProjectSection,
  #[serde(default)]
  pub artifacts: ArtifactsSection,
  /// Modules in declaration order.
  #[serde(default, rename = "module")]
  pub modules: Vec<ModuleDecl>,
  #[serde(default)]
  pub coverage: CoverageSection,
  #[serde(default)]
  pub audit: Option<AuditSection>,
  #[serde(default)]
  pub release: ReleaseSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSection {
  pub name: String,
  pub version: String,
}

/// Where the third-party artifacts consumed by the build live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactsSection {
  /// Allow-list file, relative to the project root.
  #[serde(default = "default_allowlist")]
  pub allowlist: String,
  /// Directories whose regular files are all treated as artifacts.
  #[serde(default)]
  pub dirs: Vec<String>,
  /// Individual artifact files.
  #[serde(default)]
  pub files: Vec<String>,
}

impl Default for ArtifactsSection {
  fn default() -> Self {
    Self {
      allowlist: default_allowlist(),
      dirs: Vec::new(),
      files: Vec::new(),
    }
  }
}

/// Which outputs of a dependency a module consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyScope {
  #[default]
  Main,
  Test,
}

/// A declared module-to-module dependency.
///
/// Written either as a bare module name or as a table with a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyDecl {
  Name(String),
  Scoped {
    module: String,
    #[serde(default)]
    scope: DependencyScope,
  },
}

impl DependencyDecl {
  pub fn module(&self) -> &str {
    match self {
      DependencyDecl::Name(name) => name,
      DependencyDecl::Scoped { module, .. } => module,
    }
  }

  pub fn scope(&self) -> DependencyScope {
    match self {
      DependencyDecl::Name(_) => DependencyScope::Main,
      DependencyDecl::Scoped { scope, .. } => *scope,
    }
  }
}

/// A buildable module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDecl {
  /// Path-segment identity, e.g. `src:core`.
  pub name: String,
  /// Directory relative to the project root. Defaults to the name with `:` as `/`.
  #[serde(default)]
  pub path: Option<String>,
  #[serde(default)]
  pub depends_on: Vec<DependencyDecl>,
  /// Compile command.
  #[serde(default)]
  pub build: Option<String>,
  /// Test command, bounded by the test timeout.
  #[serde(default)]
  pub test: Option<String>,
  /// Formatting check, skipped by `skipAutostyle`.
  #[serde(default)]
  pub autostyle: Option<String>,
  /// Lint check, skipped by `skipCheckstyle`.
  #[serde(default)]
  pub checkstyle: Option<String>,
  /// Static analysis command, only run when enabled.
  #[serde(default)]
  pub analysis: Option<String>,
  /// Output directory relative to the module directory.
  #[serde(default = "default_outputs")]
  pub outputs: String,
  /// Coverage trace file relative to the module directory.
  #[serde(default)]
  pub trace: Option<String>,
  /// Source directories relative to the module directory.
  #[serde(default)]
  pub sources: Vec<String>,
  /// Whether the module's outputs go into the binary distribution.
  #[serde(default = "default_true")]
  pub package: bool,
}

impl ModuleDecl {
  /// A module with only a name; every other field takes its default.
  pub fn named(name: &str) -> Self {
    Self {
      name: name.to_string(),
      path: None,
      depends_on: Vec::new(),
      build: None,
      test: None,
      autostyle: None,
      checkstyle: None,
      analysis: None,
      outputs: default_outputs(),
      trace: None,
      sources: Vec::new(),
      package: true,
    }
  }

  pub fn with_dependency(mut self, module: &str) -> Self {
    self.depends_on.push(DependencyDecl::Name(module.to_string()));
    self
  }

  /// Directory of the module relative to the project root.
  pub fn relative_dir(&self) -> PathBuf {
    match &self.path {
      Some(path) => PathBuf::from(path),
      None => self.name.split(':').filter(|s| !s.is_empty()).collect(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSection {
  /// Source globs kept in the merged report. Empty keeps everything.
  #[serde(default)]
  pub includes: Vec<String>,
  /// Report directory, relative to the project root.
  #[serde(default = "default_report_dir")]
  pub report_dir: String,
}

impl Default for CoverageSection {
  fn default() -> Self {
    Self {
      includes: Vec::new(),
      report_dir: default_report_dir(),
    }
  }
}

/// License/attribution audit settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSection {
  /// Text every audited file must contain near its top.
  #[serde(default)]
  pub header: Option<String>,
  /// External auditor command; non-zero exit is a violation.
  #[serde(default)]
  pub command: Option<String>,
  /// Root-relative directories to scan.
  #[serde(default)]
  pub roots: Vec<String>,
  #[serde(default = "default_audit_include")]
  pub include: Vec<String>,
  #[serde(default)]
  pub exclude: Vec<String>,
  /// Root-relative file with additional exclude patterns, one per line.
  #[serde(default)]
  pub ignore_file: Option<String>,
  /// How many leading lines are searched for the header.
  #[serde(default = "default_header_lines")]
  pub header_lines: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSection {
  /// Archive base name. Defaults to the project name.
  #[serde(default)]
  pub name: Option<String>,
  /// Output directory, relative to the project root.
  #[serde(default = "default_dist_dir")]
  pub dist_dir: String,
  /// Root-relative files or directories copied into the binary archives.
  #[serde(default)]
  pub files: Vec<String>,
  /// Root-relative files or directories copied into the source archives.
  #[serde(default)]
  pub source_files: Vec<String>,
  /// Archive-relative globs that receive executable permissions.
  #[serde(default)]
  pub executables: Vec<String>,
  /// Archive-relative globs left out of every archive.
  #[serde(default)]
  pub exclude: Vec<String>,
}

impl Default for ReleaseSection {
  fn default() -> Self {
    Self {
      name: None,
      dist_dir: default_dist_dir(),
      files: Vec::new(),
      source_files: Vec::new(),
      executables: Vec::new(),
      exclude: Vec::new(),
    }
  }
}

impl ProjectManifest {
  /// Empty manifest for a project.
  pub fn new(name: &str, version: &str) -> Self {
    Self {
      project: ProjectSection {
        name: name.to_string(),
        version: version.to_string(),
      },
      artifacts: ArtifactsSection::default(),
      modules: Vec::new(),
      coverage: CoverageSection::default(),
      audit: None,
      release: ReleaseSection::default(),
    }
  }

  pub fn module(&self, name: &str) -> Option<&ModuleDecl> {
    self.modules.iter().find(|m| m.name == name)
  }

  pub fn release_name(&self) -> &str {
    self.release.name.as_deref().unwrap_or(&self.project.name)
  }
}

/// A manifest bound to the directory it was loaded from.
#[derive(Debug, Clone)]
pub struct Project {
  pub root: PathBuf,
  pub manifest: ProjectManifest,
}

impl Project {
  pub fn new(root: impl Into<PathBuf>, manifest: ProjectManifest) -> Self {
    Self {
      root: root.into(),
      manifest,
    }
  }

  pub fn module_dir(&self, module: &ModuleDecl) -> PathBuf {
    self.root.join(module.relative_dir())
  }

  pub fn module_outputs(&self, module: &ModuleDecl) -> PathBuf {
    self.module_dir(module).join(&module.outputs)
  }

  pub fn module_trace(&self, module: &ModuleDecl) -> Option<PathBuf> {
    module.trace.as_ref().map(|t| self.module_dir(module).join(t))
  }

  pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
    self.root.join(relative)
  }

  pub fn allowlist_path(&self) -> PathBuf {
    self.resolve(&self.manifest.artifacts.allowlist)
  }

  pub fn coverage_report_dir(&self) -> PathBuf {
    self.resolve(&self.manifest.coverage.report_dir)
  }

  pub fn dist_dir(&self) -> PathBuf {
    self.resolve(&self.manifest.release.dist_dir)
  }
}
