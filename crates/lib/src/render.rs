//! Containerfile rendering.
//!
//! Emits the same two-stage pipeline as a multi-stage Containerfile so the
//! image can be produced by a container engine instead of [`crate::pipeline`].
//! Inside a container the toolchain is always installed, regardless of
//! `toolchain.install`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::execute::CommandSpec;
use crate::project::{FuzzProject, normalize};
use crate::stage::ToolchainEnv;
use crate::steps;

/// Source directory inside the builder container.
const CONTAINER_SRC: &str = "/src";

/// Render a Containerfile for `config`.
///
/// `copies` are the source paths to bring into the builder, relative to the
/// build context, as computed by [`copy_roots`](crate::source::SourceManifest::copy_roots). An empty path
/// copies the whole context.
///
/// With a fuzz project, the runtime stage copies one executable per declared
/// (or requested) target. Without a known target list nothing is copied, since
/// the output directory also holds build intermediates.
pub fn render_containerfile(
  config: &PipelineConfig,
  copies: &[PathBuf],
  project: Option<&FuzzProject>,
  triple: &str,
) -> String {
  let toolchain = ToolchainEnv::host(&config.toolchain.channel);
  let src = Path::new(CONTAINER_SRC);
  let mut out = String::new();

  // writing to a String never fails
  let _ = writeln!(out, "# syntax=docker/dockerfile:1");
  let _ = writeln!(out, "FROM {} AS builder", config.render.base_image);

  if config.provision.enabled {
    for spec in steps::provision::commands(&config.provision) {
      let _ = writeln!(out, "RUN {}", spec);
    }
  }

  let _ = writeln!(
    out,
    "RUN curl --proto '=https' {} -sSf {} | sh -s -- -y --no-modify-path --default-toolchain none --profile minimal",
    config.toolchain.min_tls.curl_flag(),
    config.toolchain.installer_url
  );
  let _ = writeln!(out, "ENV PATH=\"/root/.cargo/bin:${{PATH}}\"");
  let _ = writeln!(out, "RUN {}", steps::toolchain::channel_command(&toolchain));
  for spec in steps::plugin::commands(&config.plugin, &toolchain) {
    let _ = writeln!(out, "RUN {}", spec);
  }

  for path in copies {
    if normalize(path).as_os_str().is_empty() {
      let _ = writeln!(out, "COPY . {}", CONTAINER_SRC);
    } else {
      let path = slashed(path);
      let _ = writeln!(out, "COPY {} {}/{}", path, CONTAINER_SRC, path);
    }
  }
  let _ = writeln!(out, "WORKDIR {}", CONTAINER_SRC);

  for build in steps::build::commands(&config.build, &toolchain, src, &config.fuzz_dir, triple) {
    let _ = writeln!(out, "RUN {}", without_cwd(build));
  }

  let output = steps::build::BuildOutput::locate(src, &config.fuzz_dir, triple);
  let output_dir = slashed(&output.dir);
  let _ = writeln!(out);
  let _ = writeln!(out, "FROM {}", config.render.runtime_image);

  let targets = if !config.build.targets.is_empty() {
    config.build.targets.clone()
  } else {
    project.map(|p| p.target_names()).unwrap_or_default()
  };
  if targets.is_empty() {
    let _ = writeln!(out, "# no fuzz targets known, nothing copied from {}", output_dir);
  }
  for target in targets {
    let _ = writeln!(out, "COPY --from=builder {}/{} /", output_dir, target);
  }

  out
}

fn without_cwd(mut spec: CommandSpec) -> CommandSpec {
  spec.cwd = None;
  spec
}

/// Forward-slash path for Containerfile instructions.
fn slashed(path: &Path) -> String {
  let path = normalize(path);
  if path.as_os_str().is_empty() {
    return ".".to_string();
  }
  path
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect::<Vec<_>>()
    .join("/")
    .replacen("//", "/", 1)
}
