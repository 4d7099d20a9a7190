//! Test utilities for modforge-lib.
//!
//! Module commands run through the platform shell, so tests build their
//! command strings with these helpers instead of hard-coding `sh` syntax.

use std::fs;
use std::path::Path;

/// Command that prints an environment variable.
#[cfg(unix)]
pub fn echo_env(var: &str) -> String {
  format!("echo \"${}\"", var)
}

#[cfg(windows)]
pub fn echo_env(var: &str) -> String {
  format!("Write-Output $env:{}", var)
}

/// Command that sleeps for a number of seconds.
#[cfg(unix)]
pub fn sleep_cmd(secs: u64) -> String {
  format!("sleep {}", secs)
}

#[cfg(windows)]
pub fn sleep_cmd(secs: u64) -> String {
  format!("Start-Sleep -Seconds {}", secs)
}

/// Command that appends a line to a file in the working directory.
#[cfg(unix)]
pub fn append_line(file: &str, line: &str) -> String {
  format!("echo {} >> {}", line, file)
}

#[cfg(windows)]
pub fn append_line(file: &str, line: &str) -> String {
  format!("Add-Content -Path {} -Value {}", file, line)
}

/// Command that exits with a status code.
pub fn exit_cmd(code: i32) -> String {
  format!("exit {}", code)
}

/// Write a file, creating parent directories.
pub fn write_file(path: &Path, content: impl AsRef<[u8]>) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, content).unwrap();
}

/// JSON coverage trace with the given `(source, line, count)` records.
pub fn trace_json(records: &[(&str, u32, u64)]) -> String {
  let records: Vec<serde_json::Value> = records
    .iter()
    .map(|(source, line, count)| serde_json::json!({ "source": source, "line": line, "count": count }))
    .collect();
  serde_json::json!({ "records": records }).to_string()
}
