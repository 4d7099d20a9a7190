//! Archive entry planning.
//!
//! An [`ArchivePlan`] is the complete, sorted list of entries an archive will
//! contain. Planning happens before anything is written so that conflicts are
//! found up front and packaging is all-or-nothing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::consts::{ARCHIVE_DIR_MODE, ARCHIVE_EXEC_MODE, ARCHIVE_FILE_MODE};
use crate::util::pattern::PatternSet;

/// The archive would not be reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackagingDeterminismError {
  #[error("archive paths claimed by more than one source:\n  {}", .0.join("\n  "))]
  DuplicateEntries(Vec<String>),

  #[error("archive entries out of order: '{previous}' before '{next}'")]
  Unordered { previous: String, next: String },
}

/// Content of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
  Directory,
  File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
  /// Forward-slash separated path inside the archive, without trailing slash.
  pub path: String,
  pub source: EntrySource,
  pub mode: u32,
}

impl ArchiveEntry {
  pub fn is_dir(&self) -> bool {
    matches!(self.source, EntrySource::Directory)
  }
}

/// Sorted archive contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchivePlan {
  entries: Vec<ArchiveEntry>,
}

impl ArchivePlan {
  /// Wrap an entry list, rejecting anything that is not strictly ordered.
  pub fn from_entries(entries: Vec<ArchiveEntry>) -> Result<Self, PackagingDeterminismError> {
    ensure_strictly_ordered(&entries)?;
    Ok(Self { entries })
  }

  pub fn entries(&self) -> &[ArchiveEntry] {
    &self.entries
  }

  pub fn files(&self) -> impl Iterator<Item = &ArchiveEntry> {
    self.entries.iter().filter(|e| !e.is_dir())
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// Every path must sort strictly after the previous one.
pub fn ensure_strictly_ordered(entries: &[ArchiveEntry]) -> Result<(), PackagingDeterminismError> {
  for pair in entries.windows(2) {
    if pair[0].path >= pair[1].path {
      return Err(PackagingDeterminismError::Unordered {
        previous: pair[0].path.clone(),
        next: pair[1].path.clone(),
      });
    }
  }
  Ok(())
}

/// Collects entries from files and directory trees under a common prefix.
#[derive(Debug)]
pub struct PlanBuilder<'a> {
  prefix: String,
  executables: &'a PatternSet,
  exclude: &'a PatternSet,
  entries: BTreeMap<String, ArchiveEntry>,
  duplicates: Vec<String>,
}

impl<'a> PlanBuilder<'a> {
  /// `executables` and `exclude` match paths relative to the prefix.
  pub fn new(prefix: &str, executables: &'a PatternSet, exclude: &'a PatternSet) -> Self {
    let mut builder = Self {
      prefix: prefix.trim_matches('/').to_string(),
      executables,
      exclude,
      entries: BTreeMap::new(),
      duplicates: Vec::new(),
    };
    if !builder.prefix.is_empty() {
      builder.add_dir(&builder.prefix.clone());
    }
    builder
  }

  fn archive_path(&self, relative: &str) -> String {
    if self.prefix.is_empty() {
      relative.to_string()
    } else {
      format!("{}/{}", self.prefix, relative)
    }
  }

  fn add_dir(&mut self, path: &str) {
    self.entries.entry(path.to_string()).or_insert_with(|| ArchiveEntry {
      path: path.to_string(),
      source: EntrySource::Directory,
      mode: ARCHIVE_DIR_MODE,
    });
  }

  fn add_parents(&mut self, relative: &str) {
    let mut parent = String::new();
    let segments: Vec<&str> = relative.split('/').collect();
    for segment in &segments[..segments.len().saturating_sub(1)] {
      if !parent.is_empty() {
        parent.push('/');
      }
      parent.push_str(segment);
      let path = self.archive_path(&parent);
      self.add_dir(&path);
    }
  }

  /// Add one file at `relative` (prefix-relative, forward slashes).
  pub fn add_file(&mut self, relative: &str, source: &Path) {
    let relative = relative.trim_matches('/');
    if relative.is_empty() || self.exclude.matches(relative) {
      return;
    }
    self.add_parents(relative);

    let path = self.archive_path(relative);
    let mode = if self.executables.matches(relative) {
      ARCHIVE_EXEC_MODE
    } else {
      ARCHIVE_FILE_MODE
    };
    let entry = ArchiveEntry {
      path: path.clone(),
      source: EntrySource::File(source.to_path_buf()),
      mode,
    };

    match self.entries.get(&path) {
      Some(existing) if existing.source == entry.source => {}
      Some(_) => self.duplicates.push(path),
      None => {
        self.entries.insert(path, entry);
      }
    }
  }

  /// Add every regular file below `dir`, placed under `relative` (may be empty).
  pub fn add_tree(&mut self, relative: &str, dir: &Path) -> Result<(), walkdir::Error> {
    let base = relative.trim_matches('/');
    for entry in WalkDir::new(dir).sort_by_file_name() {
      let entry = entry?;
      let Ok(inner) = entry.path().strip_prefix(dir) else {
        continue;
      };
      let inner = inner
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
      let target = match (base.is_empty(), inner.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => inner,
        (false, false) => format!("{}/{}", base, inner),
      };
      if target.is_empty() || self.exclude.matches(&target) {
        continue;
      }
      if entry.file_type().is_dir() {
        self.add_parents(&target);
        let path = self.archive_path(&target);
        self.add_dir(&path);
      } else if entry.file_type().is_file() {
        self.add_file(&target, entry.path());
      }
    }
    Ok(())
  }

  /// Add a file or a directory tree.
  pub fn add_path(&mut self, relative: &str, source: &Path) -> Result<(), walkdir::Error> {
    if source.is_dir() {
      self.add_tree(relative, source)
    } else {
      self.add_file(relative, source);
      Ok(())
    }
  }

  pub fn finish(mut self) -> Result<ArchivePlan, PackagingDeterminismError> {
    if !self.duplicates.is_empty() {
      self.duplicates.sort();
      self.duplicates.dedup();
      return Err(PackagingDeterminismError::DuplicateEntries(self.duplicates));
    }
    ArchivePlan::from_entries(self.entries.into_values().collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::write_file;
  use tempfile::TempDir;

  fn paths(plan: &ArchivePlan) -> Vec<(&str, u32)> {
    plan.entries().iter().map(|e| (e.path.as_str(), e.mode)).collect()
  }

  #[test]
  fn tree_entries_are_sorted_with_directories() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");
    write_file(&out.join("lib/ApacheJMeter_core.jar"), "core");
    write_file(&out.join("bin/jmeter"), "#!/bin/sh");
    write_file(&out.join("bin/jmeter.properties"), "x=1");

    let executables = PatternSet::new(&["bin/jmeter"]).unwrap();
    let exclude = PatternSet::default();
    let mut builder = PlanBuilder::new("apache-jmeter-5.4", &executables, &exclude);
    builder.add_tree("", &out).unwrap();
    let plan = builder.finish().unwrap();

    assert_eq!(
      paths(&plan),
      vec![
        ("apache-jmeter-5.4", 0o775),
        ("apache-jmeter-5.4/bin", 0o775),
        ("apache-jmeter-5.4/bin/jmeter", 0o775),
        ("apache-jmeter-5.4/bin/jmeter.properties", 0o664),
        ("apache-jmeter-5.4/lib", 0o775),
        ("apache-jmeter-5.4/lib/ApacheJMeter_core.jar", 0o664),
      ]
    );
  }

  #[test]
  fn excluded_paths_are_left_out() {
    let temp = TempDir::new().unwrap();
    write_file(&temp.path().join("out/a.jar"), "a");
    write_file(&temp.path().join("out/tmp/scratch.txt"), "x");

    let none = PatternSet::default();
    let exclude = PatternSet::new(&["tmp", "tmp/*"]).unwrap();
    let mut builder = PlanBuilder::new("p", &none, &exclude);
    builder.add_tree("", &temp.path().join("out")).unwrap();
    let plan = builder.finish().unwrap();

    assert_eq!(paths(&plan), vec![("p", 0o775), ("p/a.jar", 0o664)]);
  }

  #[test]
  fn two_sources_for_one_path_is_a_determinism_error() {
    let temp = TempDir::new().unwrap();
    write_file(&temp.path().join("core/out/lib/shared.jar"), "one");
    write_file(&temp.path().join("jorphan/out/lib/shared.jar"), "two");

    let none = PatternSet::default();
    let mut builder = PlanBuilder::new("p", &none, &none);
    builder.add_tree("", &temp.path().join("core/out")).unwrap();
    builder.add_tree("", &temp.path().join("jorphan/out")).unwrap();

    assert_eq!(
      builder.finish().unwrap_err(),
      PackagingDeterminismError::DuplicateEntries(vec!["p/lib/shared.jar".to_string()])
    );
  }

  #[test]
  fn same_source_added_twice_is_fine() {
    let temp = TempDir::new().unwrap();
    let readme = temp.path().join("README.md");
    write_file(&readme, "hi");

    let none = PatternSet::default();
    let mut builder = PlanBuilder::new("p", &none, &none);
    builder.add_file("README.md", &readme);
    builder.add_path("README.md", &readme).unwrap();
    assert_eq!(builder.finish().unwrap().files().count(), 1);
  }

  #[test]
  fn unordered_entries_are_rejected() {
    let entry = |path: &str| ArchiveEntry {
      path: path.to_string(),
      source: EntrySource::Directory,
      mode: ARCHIVE_DIR_MODE,
    };
    let err = ArchivePlan::from_entries(vec![entry("b"), entry("a")]).unwrap_err();
    assert!(matches!(err, PackagingDeterminismError::Unordered { .. }));
    assert!(ArchivePlan::from_entries(vec![entry("a"), entry("a")]).is_err());
  }
}
