use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use fuzzpack_lib::config::PipelineConfig;
use fuzzpack_lib::project::FuzzProject;

use crate::cmd::resolve_source;
use crate::output::{OutputFormat, print_json, print_target, print_warning};

pub fn cmd_targets(source: &Path, fuzz_dir: Option<PathBuf>, output: OutputFormat) -> Result<()> {
  let source = resolve_source(source)?;
  let fuzz_dir = match fuzz_dir {
    Some(dir) => dir,
    None => PipelineConfig::discover(&source)?.fuzz_dir,
  };
  let project = FuzzProject::load(&source, &fuzz_dir).context("Failed to read fuzz project")?;

  if output.is_json() {
    return print_json(&project);
  }

  if project.targets.is_empty() {
    print_warning(&format!("No fuzz targets declared in {}", project.dir.display()));
    return Ok(());
  }

  println!("Fuzz targets ({}):", project.targets.len());
  for target in &project.targets {
    print_target(target);
  }
  Ok(())
}
