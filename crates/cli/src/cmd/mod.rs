mod build;
mod info;
mod plan;
mod render;
mod targets;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use fuzzpack_lib::config::PipelineConfig;

use crate::output::OutputFormat;

pub use build::cmd_build;
pub use info::cmd_info;
pub use plan::cmd_plan;
pub use render::cmd_render;
pub use targets::cmd_targets;

/// Options shared by every command that describes or runs the pipeline.
#[derive(Debug, Clone, Args)]
pub struct PipelineArgs {
  /// Source directory containing the fuzz project
  #[arg(default_value = ".")]
  pub source: PathBuf,

  /// Config file (default: fuzzpack.toml in the source directory, if present)
  #[arg(short, long)]
  pub config: Option<PathBuf>,

  /// Fuzz project directory, relative to the source directory
  #[arg(long)]
  pub fuzz_dir: Option<PathBuf>,

  /// Image root the fuzz executables are copied into
  #[arg(long)]
  pub out: Option<PathBuf>,

  /// Target triple to build for (default: host)
  #[arg(long)]
  pub target: Option<String>,

  /// Toolchain release channel
  #[arg(long)]
  pub channel: Option<String>,

  /// Build only this fuzz target (repeatable)
  #[arg(long = "fuzz-target", value_name = "NAME")]
  pub fuzz_targets: Vec<String>,

  /// Skip installing native packages
  #[arg(long)]
  pub skip_provision: bool,

  /// Use the toolchain already on PATH instead of installing one
  #[arg(long)]
  pub host_toolchain: bool,

  /// Copy only the fuzz project and its local path dependencies
  #[arg(long)]
  pub scoped: bool,

  /// Fail when the build produces no fuzz executables
  #[arg(long)]
  pub require_artifacts: bool,

  /// Also write the image as a .tar.gz archive
  #[arg(long)]
  pub archive: Option<PathBuf>,
}

impl PipelineArgs {
  /// File config (explicit or discovered) with command-line overrides applied.
  pub fn load_config(&self) -> Result<PipelineConfig> {
    let mut config = match &self.config {
      Some(path) => PipelineConfig::load(path),
      None => PipelineConfig::discover(&self.source),
    }
    .context("Failed to load configuration")?;

    self.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
  }

  fn apply(&self, config: &mut PipelineConfig) {
    if let Some(dir) = &self.fuzz_dir {
      config.fuzz_dir = dir.clone();
    }
    if let Some(out) = &self.out {
      config.output_dir = out.clone();
    }
    if let Some(target) = &self.target {
      config.build.target = Some(target.clone());
    }
    if let Some(channel) = &self.channel {
      config.toolchain.channel = channel.clone();
    }
    if !self.fuzz_targets.is_empty() {
      config.build.targets = self.fuzz_targets.clone();
    }
    if self.skip_provision {
      config.provision.enabled = false;
    }
    if self.host_toolchain {
      config.toolchain.install = false;
    }
    if self.scoped {
      config.source.scoped = true;
    }
    if self.require_artifacts {
      config.package.require_artifacts = true;
    }
    if let Some(archive) = &self.archive {
      config.package.archive = Some(archive.clone());
    }
  }

  pub fn source(&self) -> &Path {
    &self.source
  }

  /// The source directory as an absolute path.
  pub fn resolved_source(&self) -> Result<PathBuf> {
    resolve_source(&self.source)
  }
}

/// Canonicalize a source directory so relative paths such as `.` cannot hide
/// a path dependency that leaves the tree.
pub fn resolve_source(source: &Path) -> Result<PathBuf> {
  let resolved = dunce::canonicalize(source)
    .with_context(|| format!("Source directory not found: {}", source.display()))?;
  if !resolved.is_dir() {
    anyhow::bail!("Source is not a directory: {}", resolved.display());
  }
  Ok(resolved)
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
  #[command(flatten)]
  pub pipeline: PipelineArgs,

  /// Keep the builder stage directory for inspection
  #[arg(long)]
  pub keep_builder: bool,

  /// Replace a non-empty image root
  #[arg(short, long)]
  pub force: bool,

  /// Output format
  #[arg(short, long, value_enum, default_value_t)]
  pub output: OutputFormat,
}
