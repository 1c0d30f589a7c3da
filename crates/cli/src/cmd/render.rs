use anyhow::Result;

use fuzzpack_lib::pipeline::target_triple;
use fuzzpack_lib::project::FuzzProject;
use fuzzpack_lib::render::render_containerfile;
use fuzzpack_lib::source::SourceManifest;

use crate::cmd::PipelineArgs;
use crate::output::print_warning;

pub fn cmd_render(args: &PipelineArgs) -> Result<()> {
  let config = args.load_config()?;
  let triple = target_triple(&config)?;
  let source = args.resolved_source()?;

  let project = FuzzProject::load(&source, &config.fuzz_dir).ok();
  let manifest = match &project {
    Some(project) => SourceManifest::from_config(&source, project, &config.source)?,
    None => SourceManifest::wholesale(&config.source.exclude),
  };
  let copies = manifest.copy_roots(&source)?;

  let known_targets = !config.build.targets.is_empty() || project.as_ref().is_some_and(|p| !p.targets.is_empty());
  if !known_targets {
    print_warning("No fuzz targets known; the runtime stage will be empty");
  }

  print!("{}", render_containerfile(&config, &copies, project.as_ref(), &triple));
  Ok(())
}
