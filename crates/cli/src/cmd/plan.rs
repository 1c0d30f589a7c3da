//! Implementation of the `fuzzpack plan` command.

use anyhow::Result;
use tracing::debug;

use fuzzpack_lib::pipeline::plan;
use fuzzpack_lib::project::FuzzProject;

use crate::cmd::PipelineArgs;
use crate::output::{OutputFormat, print_json, print_planned};

pub fn cmd_plan(args: &PipelineArgs, output: OutputFormat) -> Result<()> {
  let config = args.load_config()?;
  let source = args.resolved_source()?;

  // The plan is still useful before the fuzz project exists.
  let project = match FuzzProject::load(&source, &config.fuzz_dir) {
    Ok(project) => Some(project),
    Err(e) => {
      debug!(error = %e, "fuzz project unavailable for plan");
      None
    }
  };

  let steps = plan(&config, &source, project.as_ref())?;

  if output.is_json() {
    print_json(&steps)?;
    return Ok(());
  }

  println!("Plan: {}", source.display());
  for (i, step) in steps.iter().enumerate() {
    print_planned(i, step);
  }

  Ok(())
}
