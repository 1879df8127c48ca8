//! Shell command sequences.
//!
//! A sequence is joined with `&&` and handed to a single shell, so the first
//! failing command stops the rest. Children inherit the worker's stdout and
//! stderr and the ambient environment, with an override map layered on top.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// How a failed command sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitInfo {
  Code(i32),
  Signal(i32),
  Unknown,
}

impl From<ExitStatus> for ExitInfo {
  fn from(status: ExitStatus) -> Self {
    if let Some(code) = status.code() {
      return ExitInfo::Code(code);
    }

    #[cfg(unix)]
    {
      use std::os::unix::process::ExitStatusExt;
      if let Some(signal) = status.signal() {
        return ExitInfo::Signal(signal);
      }
    }

    ExitInfo::Unknown
  }
}

impl fmt::Display for ExitInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ExitInfo::Code(code) => write!(f, "exit code {code}"),
      ExitInfo::Signal(signal) => write!(f, "signal {signal}"),
      ExitInfo::Unknown => f.write_str("unknown status"),
    }
  }
}

#[derive(Debug, Error)]
pub enum CommandError {
  #[error("failed to start shell '{shell}': {source}")]
  Spawn {
    shell: String,
    #[source]
    source: std::io::Error,
  },

  #[error("command failed with {exit}: {cmd}")]
  Failed { cmd: String, exit: ExitInfo },
}

/// Run `commands` in order in `cwd`, stopping at the first failure.
///
/// `env` is added to the inherited environment of the child only; the worker's
/// own environment is never modified. An empty sequence succeeds without
/// spawning anything.
pub async fn run_commands(
  commands: &[String],
  cwd: &Path,
  env: &BTreeMap<String, String>,
  shell: Option<&str>,
) -> Result<(), CommandError> {
  if commands.is_empty() {
    return Ok(());
  }

  let script = commands.join(" && ");
  let (shell_cmd, shell_args) = get_shell(shell);

  info!(cmd = %script, cwd = %cwd.display(), "executing commands");
  debug!(shell = %shell_cmd, env_overrides = env.len(), "spawning process");

  let status = Command::new(&shell_cmd)
    .args(&shell_args)
    .arg(&script)
    .current_dir(cwd)
    .envs(env)
    .stdin(Stdio::null())
    .stdout(Stdio::inherit())
    .stderr(Stdio::inherit())
    .status()
    .await
    .map_err(|source| CommandError::Spawn {
      shell: shell_cmd.clone(),
      source,
    })?;

  if !status.success() {
    return Err(CommandError::Failed {
      cmd: script,
      exit: status.into(),
    });
  }

  Ok(())
}

/// Shell binary and the flag that makes it run the next argument as a script.
fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell {
    let args = if shell.contains("powershell") || shell.contains("pwsh") {
      vec!["-NoProfile".to_string(), "-Command".to_string()]
    } else if shell.contains("cmd") {
      vec!["/C".to_string()]
    } else {
      vec!["-c".to_string()]
    };
    return (shell.to_string(), args);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    ("cmd.exe".to_string(), vec!["/C".to_string()])
  }
}
