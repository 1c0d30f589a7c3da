//! Command execution module.
//!
//! Every pipeline step that touches the outside world goes through a
//! [`CommandRunner`]. The production runner spawns real processes; tests
//! substitute a recording runner to check step ordering without a network
//! or a package manager.

pub mod fetch;
pub mod process;
pub mod types;

use std::future::Future;

pub use fetch::fetch_installer;
pub use process::execute_cmd;
pub use types::{CommandSpec, ExecuteError};

/// Runs commands on behalf of the pipeline.
pub trait CommandRunner: Send + Sync {
  /// Run one command to completion, returning its captured stdout.
  fn run(&self, spec: &CommandSpec) -> impl Future<Output = Result<String, ExecuteError>> + Send;
}

/// Runs commands as child processes of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
  /// Forward child output to the terminal instead of capturing it.
  pub stream: bool,
}

impl ProcessRunner {
  pub fn new(stream: bool) -> Self {
    Self { stream }
  }
}

impl CommandRunner for ProcessRunner {
  fn run(&self, spec: &CommandSpec) -> impl Future<Output = Result<String, ExecuteError>> + Send {
    execute_cmd(spec, self.stream)
  }
}
