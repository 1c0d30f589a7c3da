//! Pipeline orchestration.
//!
//! Runs the builder stage and the package stage strictly in order:
//!
//! 1. provision native dependencies
//! 2. install the toolchain and select the channel
//! 3. install the fuzz-build plugin
//! 4. materialize the source tree
//! 5. build the fuzz targets
//! 6. extract the executables into the image root
//!
//! Every failure aborts the run; later steps never start and no image is
//! written. Cheap checks (config, fuzz project manifest, image root) run
//! before the builder stage is created.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{ConfigError, PipelineConfig};
use crate::execute::{CommandRunner, ExecuteError};
use crate::package::{self, PackageError, PackageImage};
use crate::platform::host_triple;
use crate::project::{FuzzProject, ProjectError};
use crate::source::{SourceError, SourceManifest};
use crate::stage::{BuilderStage, StageLayout, ToolchainEnv};
use crate::steps::{self, build::BuildOutput};

/// Errors that abort a pipeline run, one variant per failure class.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("source directory not found: {}", .0.display())]
  SourceNotFound(PathBuf),

  #[error("unsupported host platform; set build.target explicitly")]
  UnsupportedPlatform,

  #[error("fuzz project error: {0}")]
  Project(#[from] ProjectError),

  #[error("failed to create builder stage: {0}")]
  Stage(#[source] std::io::Error),

  #[error("dependency provisioning failed: {0}")]
  Provision(#[source] ExecuteError),

  #[error("toolchain installation failed: {0}")]
  Toolchain(#[source] ExecuteError),

  #[error("plugin installation failed: {0}")]
  Plugin(#[source] ExecuteError),

  #[error("source materialization failed: {0}")]
  Materialize(#[from] SourceError),

  #[error("fuzz target compilation failed: {0}")]
  Build(#[source] ExecuteError),

  #[error("no fuzz executables found in {}", .0.display())]
  NoArtifacts(PathBuf),

  #[error("packaging failed: {0}")]
  Package(#[source] PackageError),

  #[error("stage isolation violated: {}", .0.display())]
  Isolation(PathBuf),

  #[error("failed to write image archive {}: {source}", path.display())]
  Archive {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl From<PackageError> for PipelineError {
  fn from(err: PackageError) -> Self {
    match err {
      PackageError::Isolation(path) => Self::Isolation(path),
      other => Self::Package(other),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
  Provision,
  Toolchain,
  Plugin,
  Materialize,
  Build,
  Package,
}

impl StepKind {
  pub const ALL: [StepKind; 6] = [
    StepKind::Provision,
    StepKind::Toolchain,
    StepKind::Plugin,
    StepKind::Materialize,
    StepKind::Build,
    StepKind::Package,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Provision => "provision",
      Self::Toolchain => "toolchain",
      Self::Plugin => "plugin",
      Self::Materialize => "materialize",
      Self::Build => "build",
      Self::Package => "package",
    }
  }
}

impl fmt::Display for StepKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
  Succeeded,
  Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
  pub step: StepKind,
  pub status: StepStatus,
  pub duration_ms: u64,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
  pub source_dir: PathBuf,
  pub triple: String,
  pub toolchain: ToolchainEnv,
  pub steps: Vec<StepRecord>,
  /// Targets the build was asked to produce.
  pub targets: Vec<String>,
  pub image: PackageImage,
  pub archive: Option<PathBuf>,
  pub warnings: Vec<String>,
  /// Set when the builder stage was kept for inspection.
  pub builder_root: Option<PathBuf>,
}

/// Knobs that affect a single run rather than the pipeline definition.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
  /// Keep the builder stage directory after the run.
  pub keep_builder: bool,
  /// Replace a non-empty image root.
  pub force: bool,
  /// Parent directory for the builder stage; the system temp dir when unset.
  pub stage_parent: Option<PathBuf>,
}

/// Everything checked before the builder stage exists.
struct Preflight {
  source_dir: PathBuf,
  project: FuzzProject,
  manifest: SourceManifest,
  triple: String,
  targets: Vec<String>,
}

pub struct Pipeline<R> {
  config: PipelineConfig,
  source_dir: PathBuf,
  runner: R,
  options: RunOptions,
}

impl<R: CommandRunner> Pipeline<R> {
  pub fn new(config: PipelineConfig, source_dir: impl Into<PathBuf>, runner: R) -> Self {
    Self {
      config,
      source_dir: source_dir.into(),
      runner,
      options: RunOptions::default(),
    }
  }

  pub fn with_options(mut self, options: RunOptions) -> Self {
    self.options = options;
    self
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn runner(&self) -> &R {
    &self.runner
  }

  fn preflight(&self) -> Result<Preflight, PipelineError> {
    self.config.validate()?;
    let source_dir = match dunce::canonicalize(&self.source_dir) {
      Ok(dir) if dir.is_dir() => dir,
      _ => return Err(PipelineError::SourceNotFound(self.source_dir.clone())),
    };

    let triple = target_triple(&self.config)?;
    let project = FuzzProject::load(&source_dir, &self.config.fuzz_dir)?;
    project.check_targets(&self.config.build.targets)?;
    let manifest = SourceManifest::from_config(&source_dir, &project, &self.config.source)?;
    package::check_root(&self.config.output_dir, self.options.force)?;

    let targets = if self.config.build.targets.is_empty() {
      project.target_names()
    } else {
      self.config.build.targets.clone()
    };

    if targets.is_empty() {
      warn!(fuzz_dir = %self.config.fuzz_dir.display(), "fuzz project declares no targets");
    }

    Ok(Preflight {
      source_dir,
      project,
      manifest,
      triple,
      targets,
    })
  }

  /// Run the whole pipeline.
  pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
    let preflight = self.preflight()?;
    let config = &self.config;
    let mut steps = Vec::with_capacity(StepKind::ALL.len());
    let mut warnings = Vec::new();

    info!(
      source = %preflight.source_dir.display(),
      fuzz_dir = %config.fuzz_dir.display(),
      triple = %preflight.triple,
      targets = preflight.targets.len(),
      "starting fuzz pipeline"
    );

    let stage = match &self.options.stage_parent {
      Some(parent) => BuilderStage::create_in(parent, self.options.keep_builder),
      None => BuilderStage::create(self.options.keep_builder),
    }
    .map_err(PipelineError::Stage)?;
    let layout = stage.layout().clone();

    if config.provision.enabled {
      timed(&mut steps, StepKind::Provision, async {
        steps::provision::run(&self.runner, &config.provision)
          .await
          .map_err(PipelineError::Provision)
      })
      .await?;
    } else {
      info!("provisioning disabled, skipping");
      steps.push(StepRecord {
        step: StepKind::Provision,
        status: StepStatus::Skipped,
        duration_ms: 0,
      });
    }

    let toolchain = timed(&mut steps, StepKind::Toolchain, async {
      steps::toolchain::run(&self.runner, &config.toolchain, &layout)
        .await
        .map_err(PipelineError::Toolchain)
    })
    .await?;

    timed(&mut steps, StepKind::Plugin, async {
      steps::plugin::run(&self.runner, &config.plugin, &toolchain)
        .await
        .map_err(PipelineError::Plugin)
    })
    .await?;

    timed(&mut steps, StepKind::Materialize, async {
      preflight
        .manifest
        .materialize(&preflight.source_dir, &layout.src_dir())
        .map_err(PipelineError::from)
    })
    .await?;

    let output = timed(&mut steps, StepKind::Build, async {
      steps::build::run(
        &self.runner,
        &config.build,
        &toolchain,
        &layout.src_dir(),
        &config.fuzz_dir,
        &preflight.triple,
      )
      .await
      .map_err(PipelineError::Build)
    })
    .await?;

    let image = timed(&mut steps, StepKind::Package, async {
      self.package(&output, &preflight.targets, &mut warnings)
    })
    .await?;

    let archive = match &config.package.archive {
      Some(path) => {
        package::write_archive(&image.root, &image.artifacts, path).map_err(|source| PipelineError::Archive {
          path: path.clone(),
          source,
        })?;
        Some(path.clone())
      }
      None => None,
    };

    let builder_root = self.options.keep_builder.then(|| stage.root().to_path_buf());
    drop(stage);

    info!(
      artifacts = image.artifacts.len(),
      image = %image.root.display(),
      project = ?preflight.project.name,
      "fuzz pipeline complete"
    );

    Ok(PipelineReport {
      source_dir: preflight.source_dir,
      triple: preflight.triple,
      toolchain,
      steps,
      targets: preflight.targets,
      image,
      archive,
      warnings,
      builder_root,
    })
  }

  fn package(
    &self,
    output: &BuildOutput,
    targets: &[String],
    warnings: &mut Vec<String>,
  ) -> Result<PackageImage, PipelineError> {
    let found = package::collect_artifacts(output)?;
    if found.is_empty() {
      if self.config.package.require_artifacts {
        return Err(PipelineError::NoArtifacts(output.dir.clone()));
      }
      let message = format!(
        "no fuzz executables found in {}; the image will be empty",
        output.dir.display()
      );
      warn!("{}", message);
      warnings.push(message);
    }

    let image = package::package(output, &self.config.output_dir, targets, self.options.force)?;
    for target in &image.missing {
      warnings.push(format!("declared fuzz target {} produced no executable", target));
    }

    package::verify_isolation(&image)?;
    Ok(image)
  }
}

/// Await a step, recording its duration on success.
async fn timed<T, F>(steps: &mut Vec<StepRecord>, step: StepKind, fut: F) -> Result<T, PipelineError>
where
  F: Future<Output = Result<T, PipelineError>>,
{
  let started = Instant::now();
  info!(step = %step, "step started");

  match fut.await {
    Ok(value) => {
      let duration_ms = started.elapsed().as_millis() as u64;
      info!(step = %step, duration_ms, "step finished");
      steps.push(StepRecord {
        step,
        status: StepStatus::Succeeded,
        duration_ms,
      });
      Ok(value)
    }
    Err(e) => {
      error!(step = %step, error = %e, "step failed");
      Err(e)
    }
  }
}

/// The configured target triple, or the host's.
pub fn target_triple(config: &PipelineConfig) -> Result<String, PipelineError> {
  match &config.build.target {
    Some(triple) => Ok(triple.clone()),
    None => host_triple().ok_or(PipelineError::UnsupportedPlatform),
  }
}

/// One step of a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
  pub step: StepKind,
  pub enabled: bool,
  pub actions: Vec<String>,
}

/// Describe what [`Pipeline::run`] would do, without doing it.
///
/// Stage paths are shown relative to a `<stage>` placeholder. The fuzz
/// project is optional here; without it a scoped source manifest cannot be
/// computed and the whole tree is shown instead.
pub fn plan(
  config: &PipelineConfig,
  source_dir: &Path,
  project: Option<&FuzzProject>,
) -> Result<Vec<PlannedStep>, PipelineError> {
  config.validate()?;
  let triple = target_triple(config)?;
  let layout = StageLayout::new("<stage>");
  let toolchain = steps::toolchain::select(&config.toolchain, &layout);

  let render = |specs: Vec<crate::execute::CommandSpec>| specs.iter().map(|s| s.to_string()).collect::<Vec<_>>();

  let mut toolchain_actions = Vec::new();
  if config.toolchain.install {
    toolchain_actions.push(format!(
      "fetch {} (TLS >= {}) -> {}",
      config.toolchain.installer_url,
      config.toolchain.min_tls.as_str(),
      layout.installer_path().display()
    ));
  }
  toolchain_actions.extend(render(steps::toolchain::commands(&config.toolchain, &layout)));

  let manifest = match project {
    Some(project) => SourceManifest::from_config(source_dir, project, &config.source)?,
    None => SourceManifest::wholesale(&config.source.exclude),
  };
  let materialize_actions = manifest
    .include
    .iter()
    .map(|p| {
      let shown = if p.as_os_str().is_empty() { Path::new(".") } else { p.as_path() };
      format!(
        "copy {} -> {}",
        source_dir.join(shown).display(),
        layout.src_dir().join(p).display()
      )
    })
    .chain(
      (!manifest.exclude.is_empty()).then(|| format!("exclude {}", manifest.exclude.join(", "))),
    )
    .collect();

  let output = BuildOutput::locate(&layout.src_dir(), &config.fuzz_dir, &triple);
  let build_actions = steps::build::commands(
    &config.build,
    &toolchain,
    &layout.src_dir(),
    &config.fuzz_dir,
    &triple,
  )
  .iter()
  .map(|spec| format!("(in {}) {}", layout.src_dir().display(), spec))
  .collect();

  let mut package_actions = vec![format!(
    "copy executables {}/* -> {}",
    output.dir.display(),
    config.output_dir.display()
  )];
  if let Some(archive) = &config.package.archive {
    package_actions.push(format!("archive {} -> {}", config.output_dir.display(), archive.display()));
  }

  Ok(vec![
    PlannedStep {
      step: StepKind::Provision,
      enabled: config.provision.enabled,
      actions: render(steps::provision::commands(&config.provision)),
    },
    PlannedStep {
      step: StepKind::Toolchain,
      enabled: true,
      actions: toolchain_actions,
    },
    PlannedStep {
      step: StepKind::Plugin,
      enabled: true,
      actions: render(steps::plugin::commands(&config.plugin, &toolchain)),
    },
    PlannedStep {
      step: StepKind::Materialize,
      enabled: true,
      actions: materialize_actions,
    },
    PlannedStep {
      step: StepKind::Build,
      enabled: true,
      actions: build_actions,
    },
    PlannedStep {
      step: StepKind::Package,
      enabled: true,
      actions: package_actions,
    },
  ])
}
