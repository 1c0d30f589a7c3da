//! Fuzz-target compilation.
//!
//! Invokes `cargo fuzz build` in release mode with an explicit target triple
//! so the output lands at a known location:
//! `<src>/<fuzz-dir>/target/<triple>/release/`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::BuildConfig;
use crate::consts::{FUZZ_BUILD_ROOT, RELEASE_PROFILE};
use crate::execute::{CommandRunner, CommandSpec, ExecuteError};
use crate::project::normalize;
use crate::stage::ToolchainEnv;
use crate::steps::run_all;

/// Where a successful fuzz build leaves its executables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOutput {
  pub dir: PathBuf,
  pub triple: String,
  pub profile: String,
}

impl BuildOutput {
  pub fn locate(src_dir: &Path, fuzz_dir: &Path, triple: &str) -> Self {
    let dir = src_dir
      .join(normalize(fuzz_dir))
      .join(FUZZ_BUILD_ROOT)
      .join(triple)
      .join(RELEASE_PROFILE);
    Self {
      dir,
      triple: triple.to_string(),
      profile: RELEASE_PROFILE.to_string(),
    }
  }
}

/// One `cargo fuzz build` invocation.
///
/// `cargo fuzz build` accepts a single target; `None` builds every target the
/// fuzz project declares.
pub fn command(
  config: &BuildConfig,
  toolchain: &ToolchainEnv,
  src_dir: &Path,
  fuzz_dir: &Path,
  triple: &str,
  target: Option<&str>,
) -> CommandSpec {
  let spec = CommandSpec::new(toolchain.cargo())
    .args(["fuzz", "build", "-O", "--fuzz-dir"])
    .arg(fuzz_dir.to_string_lossy())
    .args(["--target", triple, "--sanitizer", config.sanitizer.as_str()])
    .args(target)
    .cwd(src_dir);
  toolchain.apply(spec)
}

/// Build commands in execution order: one per selected target, or a single
/// build of everything when no targets are selected.
pub fn commands(
  config: &BuildConfig,
  toolchain: &ToolchainEnv,
  src_dir: &Path,
  fuzz_dir: &Path,
  triple: &str,
) -> Vec<CommandSpec> {
  if config.targets.is_empty() {
    return vec![command(config, toolchain, src_dir, fuzz_dir, triple, None)];
  }
  config
    .targets
    .iter()
    .map(|target| command(config, toolchain, src_dir, fuzz_dir, triple, Some(target.as_str())))
    .collect()
}

pub async fn run<R: CommandRunner>(
  runner: &R,
  config: &BuildConfig,
  toolchain: &ToolchainEnv,
  src_dir: &Path,
  fuzz_dir: &Path,
  triple: &str,
) -> Result<BuildOutput, ExecuteError> {
  info!(
    fuzz_dir = %fuzz_dir.display(),
    triple,
    channel = %toolchain.channel,
    targets = config.targets.len(),
    "building fuzz targets"
  );
  run_all(runner, &commands(config, toolchain, src_dir, fuzz_dir, triple)).await?;

  let output = BuildOutput::locate(src_dir, fuzz_dir, triple);
  info!(dir = %output.dir.display(), "fuzz build finished");
  Ok(output)
}
