//! Process execution.
//!
//! Runs a [`CommandSpec`] as a child process. Stdin is always closed so any
//! tool that tries to prompt fails instead of hanging the pipeline.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::execute::types::{CommandSpec, ExecuteError};

/// Execute a command and return its trimmed stdout.
///
/// When `stream` is set the child's stdout/stderr go straight to the
/// terminal (useful for long compiler runs) and the returned string is empty.
/// Otherwise output is captured and logged at debug level on failure.
pub async fn execute_cmd(spec: &CommandSpec, stream: bool) -> Result<String, ExecuteError> {
  info!(cmd = %spec, "executing command");

  let mut command = Command::new(&spec.program);
  command.args(&spec.args).stdin(Stdio::null()).envs(&spec.env);

  if let Some(cwd) = &spec.cwd {
    command.current_dir(cwd);
  }

  if stream {
    command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    let status = command.status().await.map_err(|source| ExecuteError::Spawn {
      program: spec.program.clone(),
      source,
    })?;

    if !status.success() {
      return Err(ExecuteError::CmdFailed {
        cmd: spec.to_string(),
        code: status.code(),
      });
    }
    return Ok(String::new());
  }

  debug!(program = %spec.program, cwd = ?spec.cwd, "spawning process");

  let output = command.output().await.map_err(|source| ExecuteError::Spawn {
    program: spec.program.clone(),
    source,
  })?;

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
      cmd: spec.to_string(),
      code: output.status.code(),
    });
  }

  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }

  Ok(stdout)
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
  use super::*;
  use crate::util::testutil::{shell_cmd, shell_echo_env};
  use tempfile::TempDir;

  #[tokio::test]
  async fn execute_simple_command() {
    let (program, args) = shell_cmd("echo hello");
    let spec = CommandSpec::new(program).args(args);

    let result = execute_cmd(&spec, false).await.unwrap();

    assert_eq!(result, "hello");
  }

  #[tokio::test]
  async fn execute_command_with_env() {
    let (program, args) = shell_echo_env("MY_VAR");
    let spec = CommandSpec::new(program).args(args).env("MY_VAR", "my_value");

    let result = execute_cmd(&spec, false).await.unwrap();

    assert_eq!(result, "my_value");
  }

  #[tokio::test]
  async fn execute_command_failure() {
    let (program, args) = shell_cmd("exit 3");
    let spec = CommandSpec::new(program).args(args);

    let result = execute_cmd(&spec, false).await;

    assert!(matches!(result, Err(ExecuteError::CmdFailed { code: Some(3), .. })));
  }

  #[tokio::test]
  async fn execute_missing_program_is_spawn_error() {
    let spec = CommandSpec::new("/nonexistent/fuzzpack-test-binary");

    let result = execute_cmd(&spec, false).await;

    assert!(matches!(result, Err(ExecuteError::Spawn { .. })));
  }

  #[tokio::test]
  async fn execute_command_with_cwd() {
    let temp_dir = TempDir::new().unwrap();
    let sub_dir = temp_dir.path().join("subdir");
    tokio::fs::create_dir(&sub_dir).await.unwrap();

    let (program, args) = shell_cmd("touch cwd_marker");
    let spec = CommandSpec::new(program).args(args).cwd(&sub_dir);
    execute_cmd(&spec, false).await.unwrap();

    assert!(
      sub_dir.join("cwd_marker").exists(),
      "cwd_marker should exist in subdirectory, proving cwd was set correctly"
    );
  }

  #[tokio::test]
  async fn prompting_command_fails_without_stdin() {
    // `read` hits EOF immediately on a null stdin and returns non-zero
    let (program, args) = shell_cmd("read answer");
    let spec = CommandSpec::new(program).args(args);

    let result = execute_cmd(&spec, false).await;

    assert!(matches!(result, Err(ExecuteError::CmdFailed { .. })));
  }

  #[tokio::test]
  async fn streaming_returns_empty_output() {
    let (program, args) = shell_cmd("true");
    let spec = CommandSpec::new(program).args(args);

    let result = execute_cmd(&spec, true).await.unwrap();

    assert!(result.is_empty());
  }
}
