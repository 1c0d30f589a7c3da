//! Implementation of the `fuzzpack build` command.
//!
//! Runs the full pipeline with real processes and prints a summary of the
//! packaged image.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use fuzzpack_lib::execute::ProcessRunner;
use fuzzpack_lib::pipeline::{Pipeline, PipelineReport, RunOptions};

use crate::cmd::BuildArgs;
use crate::output::{format_duration, print_artifact, print_done, print_field, print_json, print_step, print_warning};

pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let start = Instant::now();
  let config = args.pipeline.load_config()?;
  let json = args.output.is_json();

  let options = RunOptions {
    keep_builder: args.keep_builder,
    force: args.force,
    stage_parent: None,
  };
  // Child output goes to the terminal unless stdout is reserved for JSON.
  let runner = ProcessRunner::new(!json);
  let pipeline = Pipeline::new(config, args.pipeline.source(), runner).with_options(options);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(pipeline.run()).context("Build failed")?;

  if json {
    print_json(&report)?;
  } else {
    print_summary(&report, start.elapsed());
  }

  Ok(())
}

fn print_summary(report: &PipelineReport, elapsed: Duration) {
  println!();
  print_done("Build complete!");
  for step in &report.steps {
    print_step(step);
  }

  println!();
  print_field("Target", &report.triple);
  print_field("Channel", &report.toolchain.channel);
  print_field("Image", report.image.root.display());
  print_field("Executables", report.image.artifacts.len());
  for artifact in &report.image.artifacts {
    print_artifact(artifact);
  }
  if let Some(archive) = &report.archive {
    print_field("Archive", archive.display());
  }
  print_field("Duration", format_duration(elapsed));
  if let Some(root) = &report.builder_root {
    print_field("Builder stage kept at", root.display());
  }

  for warning in &report.warnings {
    print_warning(warning);
  }
}
