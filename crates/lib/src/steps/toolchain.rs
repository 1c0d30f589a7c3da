//! Toolchain installation.
//!
//! Fetches the rustup installer over pinned TLS, installs it into the stage's
//! own CARGO_HOME/RUSTUP_HOME, and installs the configured release channel.
//! The channel is not made a global default; it is returned as a
//! [`ToolchainEnv`] for later steps to apply.

use tracing::info;

use crate::config::ToolchainConfig;
use crate::execute::{CommandRunner, CommandSpec, ExecuteError, fetch_installer};
use crate::stage::{StageLayout, ToolchainEnv};

/// The toolchain the configuration selects for a stage.
pub fn select(config: &ToolchainConfig, layout: &StageLayout) -> ToolchainEnv {
  if config.install {
    ToolchainEnv::staged(layout, &config.channel)
  } else {
    ToolchainEnv::host(&config.channel)
  }
}

/// Runs the downloaded installer without touching shell profiles.
pub fn installer_command(layout: &StageLayout, toolchain: &ToolchainEnv) -> CommandSpec {
  let spec = CommandSpec::new("sh")
    .arg(layout.installer_path().to_string_lossy())
    .args([
      "-y",
      "--no-modify-path",
      "--default-toolchain",
      "none",
      "--profile",
      "minimal",
    ]);
  toolchain.apply_homes(spec)
}

/// Installs the release channel without selecting it as default.
pub fn channel_command(toolchain: &ToolchainEnv) -> CommandSpec {
  let spec = CommandSpec::new(toolchain.rustup())
    .args(["toolchain", "install"])
    .arg(toolchain.channel.as_str())
    .args(["--profile", "minimal"]);
  toolchain.apply_homes(spec)
}

/// Commands run after the installer has been fetched.
pub fn commands(config: &ToolchainConfig, layout: &StageLayout) -> Vec<CommandSpec> {
  let toolchain = select(config, layout);
  if config.install {
    vec![installer_command(layout, &toolchain), channel_command(&toolchain)]
  } else {
    vec![channel_command(&toolchain)]
  }
}

pub async fn run<R: CommandRunner>(
  runner: &R,
  config: &ToolchainConfig,
  layout: &StageLayout,
) -> Result<ToolchainEnv, ExecuteError> {
  let toolchain = select(config, layout);

  if config.install {
    fetch_installer(
      &config.installer_url,
      config.min_tls,
      config.installer_sha256.as_deref(),
      &layout.installer_path(),
    )
    .await?;
  }

  super::run_all(runner, &commands(config, layout)).await?;

  info!(channel = %toolchain.channel, staged = config.install, "toolchain ready");
  Ok(toolchain)
}
