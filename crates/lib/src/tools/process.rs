//! External process execution.
//!
//! Tools are always invoked with a discrete argument vector; nothing is ever
//! passed through a shell. Success is decided by exit status alone. Output is
//! captured and handed back verbatim so failures can be reported.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// A fully specified tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
  pub program: String,
  pub args: Vec<OsString>,
  pub cwd: Option<PathBuf>,
}

impl ToolCommand {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
    }
  }

  pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
    self.cwd = Some(dir.as_ref().to_path_buf());
    self
  }

  /// Arguments as lossy strings, for assertions and display.
  pub fn arg_strings(&self) -> Vec<String> {
    self.args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
  }
}

impl fmt::Display for ToolCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      let arg = arg.to_string_lossy();
      if arg.is_empty() || arg.contains(char::is_whitespace) {
        write!(f, " {:?}", arg)?;
      } else {
        write!(f, " {}", arg)?;
      }
    }
    Ok(())
  }
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
  pub stdout: String,
  pub stderr: String,
}

/// A tool that ran and exited unsuccessfully.
#[derive(Debug, Clone, Error, Serialize)]
#[error("`{command}` exited with {}", describe_exit(*exit_code))]
pub struct ProcessFailure {
  pub command: String,
  /// `None` when the process was terminated by a signal.
  pub exit_code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

fn describe_exit(code: Option<i32>) -> String {
  match code {
    Some(code) => format!("exit code {}", code),
    None => "no exit code (terminated by signal)".to_string(),
  }
}

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Failed(#[from] ProcessFailure),
}

/// Run a tool to completion.
///
/// The child is killed if the returned future is dropped before it exits, so
/// aborting a plan never leaves tools running.
pub async fn run_tool(cmd: &ToolCommand) -> Result<ProcessOutput, ProcessError> {
  info!(cmd = %cmd, "running tool");

  let mut command = Command::new(&cmd.program);
  command
    .args(&cmd.args)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  if let Some(cwd) = &cmd.cwd {
    command.current_dir(cwd);
  }

  debug!(program = %cmd.program, cwd = ?cmd.cwd, "spawning process");

  let output = command.output().await.map_err(|source| ProcessError::Spawn {
    program: cmd.program.clone(),
    source,
  })?;

  let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
  let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

  if !output.status.success() {
    if !stderr.is_empty() {
      debug!(stderr = %stderr, "tool stderr");
    }
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "tool stdout");
    }

    return Err(ProcessError::Failed(ProcessFailure {
      command: cmd.to_string(),
      exit_code: output.status.code(),
      stdout,
      stderr,
    }));
  }

  if !stdout.is_empty() {
    debug!(stdout = %stdout.trim(), "tool output");
  }

  Ok(ProcessOutput { stdout, stderr })
}
