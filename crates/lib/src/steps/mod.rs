//! Pipeline steps.
//!
//! Each step exposes a pure `commands` function (used by `plan` and `render`)
//! and an async `run` that feeds those commands to a [`CommandRunner`] in
//! order, stopping at the first failure.
//!
//! [`CommandRunner`]: crate::execute::CommandRunner

pub mod build;
pub mod plugin;
pub mod provision;
pub mod toolchain;

use crate::execute::{CommandRunner, CommandSpec, ExecuteError};

/// Run commands strictly in sequence.
pub(crate) async fn run_all<R: CommandRunner>(runner: &R, commands: &[CommandSpec]) -> Result<(), ExecuteError> {
  for spec in commands {
    runner.run(spec).await?;
  }
  Ok(())
}
