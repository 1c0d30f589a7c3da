mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fuzzpack_lib::consts::LOG_ENV;

use crate::cmd::{BuildArgs, PipelineArgs};
use crate::output::{OutputFormat, print_error};

/// fuzzpack - build fuzz harnesses and package them into a minimal image
#[derive(Parser)]
#[command(name = "fuzzpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the fuzz targets and package the executables into an image directory
  Build(BuildArgs),

  /// Show the steps a build would run, without running anything
  Plan {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Print an equivalent multi-stage Containerfile
  Render {
    #[command(flatten)]
    pipeline: PipelineArgs,
  },

  /// List the fuzz targets declared by the fuzz project
  Targets {
    /// Source directory containing the fuzz project
    #[arg(default_value = ".")]
    source: PathBuf,

    /// Fuzz project directory, relative to the source directory
    #[arg(long)]
    fuzz_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Show host platform information
  Info,
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_env(LOG_ENV)
    .or_else(|_| EnvFilter::try_from_default_env())
    .unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let result: Result<()> = match cli.command {
    Commands::Build(args) => cmd::cmd_build(args),
    Commands::Plan { pipeline, output } => cmd::cmd_plan(&pipeline, output),
    Commands::Render { pipeline } => cmd::cmd_render(&pipeline),
    Commands::Targets {
      source,
      fuzz_dir,
      output,
    } => cmd::cmd_targets(&source, fuzz_dir, output),
    Commands::Info => {
      cmd::cmd_info();
      Ok(())
    }
  };

  if let Err(e) = result {
    print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
}
