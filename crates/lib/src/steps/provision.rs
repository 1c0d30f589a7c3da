//! Native dependency provisioning.
//!
//! Refreshes the package index and installs the native build dependencies
//! without any interaction. The package manager's own prompts are disabled
//! and stdin is closed, so a prompt turns into a failed step.

use tracing::info;

use crate::config::ProvisionConfig;
use crate::execute::{CommandRunner, CommandSpec, ExecuteError};

use super::run_all;

/// Index refresh followed by the install.
pub fn commands(config: &ProvisionConfig) -> Vec<CommandSpec> {
  let pm = config.package_manager.as_str();
  let refresh = CommandSpec::new(pm)
    .arg("update")
    .env("DEBIAN_FRONTEND", "noninteractive");
  let install = CommandSpec::new(pm)
    .args(["install", "-y", "--no-install-recommends"])
    .args(config.packages.iter().cloned())
    .env("DEBIAN_FRONTEND", "noninteractive");

  if config.packages.is_empty() {
    vec![refresh]
  } else {
    vec![refresh, install]
  }
}

pub async fn run<R: CommandRunner>(runner: &R, config: &ProvisionConfig) -> Result<(), ExecuteError> {
  info!(packages = ?config.packages, manager = %config.package_manager, "provisioning native dependencies");
  run_all(runner, &commands(config)).await
}
