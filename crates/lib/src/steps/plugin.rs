//! Fuzz-build plugin installation.
//!
//! `cargo install --force` rebuilds and overwrites any existing install, so
//! the step can be repeated without changing the outcome.

use tracing::info;

use crate::config::PluginConfig;
use crate::execute::{CommandRunner, CommandSpec, ExecuteError};
use crate::stage::ToolchainEnv;

use super::run_all;

pub fn commands(config: &PluginConfig, toolchain: &ToolchainEnv) -> Vec<CommandSpec> {
  let mut install = CommandSpec::new(toolchain.cargo())
    .args(["install", "--force", "--locked"])
    .arg(config.name.as_str());
  if let Some(version) = &config.version {
    install = install.args(["--version", version.as_str()]);
  }
  vec![toolchain.apply(install)]
}

pub async fn run<R: CommandRunner>(
  runner: &R,
  config: &PluginConfig,
  toolchain: &ToolchainEnv,
) -> Result<(), ExecuteError> {
  info!(plugin = %config.name, version = ?config.version, "installing fuzz-build plugin");
  run_all(runner, &commands(config, toolchain)).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::RecordingRunner;

  #[test]
  fn force_installs_with_selected_channel() {
    let specs = commands(&PluginConfig::default(), &ToolchainEnv::host("nightly"));
    assert_eq!(specs.len(), 1);
    assert_eq!(
      specs[0].to_string(),
      "RUSTUP_TOOLCHAIN=nightly cargo install --force --locked cargo-fuzz"
    );
  }

  #[test]
  fn pins_version_when_configured() {
    let config = PluginConfig {
      version: Some("0.12.0".into()),
      ..Default::default()
    };
    let specs = commands(&config, &ToolchainEnv::host("nightly"));
    assert!(specs[0].has_args(&["--version", "0.12.0"]));
  }

  #[tokio::test]
  async fn repeated_install_is_idempotent() {
    let runner = RecordingRunner::new();
    let toolchain = ToolchainEnv::host("nightly");

    run(&runner, &PluginConfig::default(), &toolchain).await.unwrap();
    run(&runner, &PluginConfig::default(), &toolchain).await.unwrap();

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
  }
}
