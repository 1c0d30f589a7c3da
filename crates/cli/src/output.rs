//! Terminal output for fuzzpack commands.
//!
//! Text goes to stdout, colored when the terminal supports it. Warnings and
//! errors go to stderr so `--output json` leaves a single JSON document on
//! stdout.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use fuzzpack_lib::package::Artifact;
use fuzzpack_lib::pipeline::{PlannedStep, StepRecord, StepStatus};
use fuzzpack_lib::project::FuzzTarget;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const DONE: &str = "✓";
  pub const FAILED: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const TARGET: &str = "•";
  pub const ARROW: &str = "→";
  pub const SKIPPED: &str = "-";
}

/// `sha256:` and the first 12 hex digits.
pub fn short_digest(sha256: &str) -> String {
  format!("sha256:{}", &sha256[..sha256.len().min(12)])
}

/// Executable size in binary units.
pub fn format_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

  let mut value = bytes as f64;
  let mut unit = 0;
  while value >= 1024.0 && unit + 1 < UNITS.len() {
    value /= 1024.0;
    unit += 1;
  }
  if unit == 0 {
    format!("{} B", bytes)
  } else {
    format!("{:.1} {}", value, UNITS[unit])
  }
}

/// Durations are rounded to milliseconds before formatting.
pub fn format_duration(duration: Duration) -> String {
  let rounded = Duration::from_millis(duration.as_millis() as u64);
  if rounded.is_zero() {
    return "0ms".to_string();
  }
  humantime::format_duration(rounded).to_string()
}

fn step_line(record: &StepRecord) -> String {
  let (symbol, detail) = match record.status {
    StepStatus::Succeeded => (symbols::DONE, format_duration(Duration::from_millis(record.duration_ms))),
    StepStatus::Skipped => (symbols::SKIPPED, "skipped".to_string()),
  };
  format!("{} {:<12} {}", symbol, record.step.as_str(), detail)
}

fn artifact_line(artifact: &Artifact) -> String {
  format!(
    "{} {} ({}, {})",
    symbols::ARROW,
    artifact.name,
    format_size(artifact.size),
    short_digest(&artifact.sha256)
  )
}

fn target_line(target: &FuzzTarget) -> String {
  match &target.path {
    Some(path) => format!("{} {} ({})", symbols::TARGET, target.name, path.display()),
    None => format!("{} {}", symbols::TARGET, target.name),
  }
}

/// Numbered step heading followed by one arrow line per action.
fn planned_lines(index: usize, planned: &PlannedStep) -> Vec<String> {
  let state = if planned.enabled { "" } else { " (skipped)" };
  let mut lines = vec![format!("{}. {}{}", index + 1, planned.step, state)];
  lines.extend(planned.actions.iter().map(|a| format!("   {} {}", symbols::ARROW, a)));
  lines
}

pub fn print_done(message: &str) {
  println!(
    "{} {}",
    symbols::DONE.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::FAILED.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_field(label: &str, value: impl std::fmt::Display) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_step(record: &StepRecord) {
  let line = step_line(record);
  match record.status {
    StepStatus::Succeeded => println!("  {}", line),
    StepStatus::Skipped => println!("  {}", line.if_supports_color(Stream::Stdout, |s| s.dimmed())),
  }
}

pub fn print_artifact(artifact: &Artifact) {
  println!("    {}", artifact_line(artifact));
}

pub fn print_target(target: &FuzzTarget) {
  println!("  {}", target_line(target));
}

pub fn print_planned(index: usize, planned: &PlannedStep) {
  for line in planned_lines(index, planned) {
    println!("{}", line);
  }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
