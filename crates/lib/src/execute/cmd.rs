//! Module command execution.
//!
//! Module commands run through the platform shell in the module directory.
//! Unlike a hermetic build the caller's environment is inherited, since the
//! external tools (compilers, formatters, analysers) live on the user's PATH.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::consts::SOURCE_DATE_EPOCH;
use crate::execute::types::ExecuteError;

/// Execute one module command.
///
/// # Arguments
///
/// * `cmd` - The command string to execute
/// * `cwd` - Working directory, usually the module directory
/// * `env` - Additional environment variables
/// * `timeout` - Optional upper bound; the process is killed when exceeded
///
/// # Returns
///
/// The stdout of the command on success (trimmed).
pub async fn execute_cmd(
  cmd: &str,
  cwd: &Path,
  env: &BTreeMap<String, String>,
  timeout: Option<Duration>,
) -> Result<String, ExecuteError> {
  info!(cmd = %cmd, cwd = %cwd.display(), "executing command");

  let (shell_cmd, shell_args) = get_shell();

  let mut command = Command::new(&shell_cmd);
  command
    .args(&shell_args)
    .arg(cmd)
    .current_dir(cwd)
    .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH.to_string())
    .kill_on_drop(true);

  for (key, value) in env {
    command.env(key, value);
  }

  debug!(shell = %shell_cmd, "spawning process");

  let output = match timeout {
    Some(limit) => match tokio::time::timeout(limit, command.output()).await {
      Ok(result) => result?,
      Err(_) => {
        return Err(ExecuteError::TimedOut {
          cmd: cmd.to_string(),
          timeout: limit.into(),
        });
      }
    },
    None => command.output().await?,
  };

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);

    if !stderr.is_empty() {
      debug!(stderr = %stderr, "command stderr");
    }
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command stdout");
    }

    return Err(ExecuteError::CmdFailed {
      cmd: cmd.to_string(),
      code: output.status.code(),
    });
  }

  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }

  Ok(stdout)
}

/// Shell command and argument for the current platform.
fn get_shell() -> (String, Vec<String>) {
  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    (
      "powershell.exe".to_string(),
      vec![
        "-NoProfile".to_string(),
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-Command".to_string(),
      ],
    )
  }
}
