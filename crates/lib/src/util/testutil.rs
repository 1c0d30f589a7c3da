//! Test utilities for fuzzpack-lib.
//!
//! Helpers for tests that spawn shell commands, plus a recording
//! [`CommandRunner`] that stands in for the package manager, rustup and cargo.

use std::path::Path;
use std::sync::Mutex;

use crate::execute::{CommandRunner, CommandSpec, ExecuteError};

/// Returns the shell command and args to echo an environment variable.
#[cfg(unix)]
pub fn shell_echo_env(var: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), format!("echo \"${}\"", var)])
}

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

/// Write a file with the executable bit set.
pub fn write_executable(path: &Path, content: &[u8]) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }
}

/// Write a minimal cargo-fuzz project manifest declaring `targets`.
pub fn write_fuzz_project(fuzz_dir: &Path, deps: &[(&str, &str)], targets: &[&str]) {
  std::fs::create_dir_all(fuzz_dir.join("fuzz_targets")).unwrap();
  let mut manifest = String::from(
    "[package]\nname = \"sample-fuzz\"\nversion = \"0.0.0\"\npublish = false\nedition = \"2021\"\n\n\
     [package.metadata]\ncargo-fuzz = true\n\n[dependencies]\nlibfuzzer-sys = \"0.4\"\n",
  );
  for (name, path) in deps {
    manifest.push_str(&format!("{} = {{ path = \"{}\" }}\n", name, path));
  }
  for target in targets {
    manifest.push_str(&format!(
      "\n[[bin]]\nname = \"{0}\"\npath = \"fuzz_targets/{0}.rs\"\ntest = false\ndoc = false\n",
      target
    ));
    std::fs::write(
      fuzz_dir.join("fuzz_targets").join(format!("{}.rs", target)),
      "#![no_main]\nlibfuzzer_sys::fuzz_target!(|_data: &[u8]| {});\n",
    )
    .unwrap();
  }
  std::fs::write(fuzz_dir.join("Cargo.toml"), manifest).unwrap();
}

/// A runner that records every command instead of spawning it.
///
/// - `fail_on`: the first command whose rendering contains this string fails
/// - `fuzz_outputs`: on `cargo fuzz build`, these executables are written into
///   `<cwd>/<fuzz-dir>/target/<triple>/release/`, mimicking cargo-fuzz
#[derive(Default)]
pub struct RecordingRunner {
  pub calls: Mutex<Vec<CommandSpec>>,
  pub fail_on: Option<String>,
  pub fuzz_outputs: Vec<String>,
}

impl RecordingRunner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing_on(mut self, needle: &str) -> Self {
    self.fail_on = Some(needle.to_string());
    self
  }

  pub fn producing(mut self, outputs: &[&str]) -> Self {
    self.fuzz_outputs = outputs.iter().map(|s| s.to_string()).collect();
    self
  }

  pub fn calls(&self) -> Vec<CommandSpec> {
    self.calls.lock().unwrap().clone()
  }

  /// Rendered command lines, in execution order.
  pub fn rendered(&self) -> Vec<String> {
    self.calls().iter().map(|c| c.to_string()).collect()
  }

  fn record(&self, spec: &CommandSpec) -> Result<String, ExecuteError> {
    self.calls.lock().unwrap().push(spec.clone());

    let rendered = spec.to_string();
    if let Some(needle) = &self.fail_on {
      if rendered.contains(needle.as_str()) {
        return Err(ExecuteError::CmdFailed {
          cmd: rendered,
          code: Some(1),
        });
      }
    }

    if spec.has_args(&["fuzz", "build"]) {
      self.write_fuzz_outputs(spec);
    }

    Ok(String::new())
  }

  fn write_fuzz_outputs(&self, spec: &CommandSpec) {
    let value_of = |flag: &str| {
      spec
        .args
        .iter()
        .position(|a| a == flag)
        .and_then(|i| spec.args.get(i + 1))
        .cloned()
    };
    let (Some(fuzz_dir), Some(triple), Some(cwd)) = (value_of("--fuzz-dir"), value_of("--target"), spec.cwd.as_ref())
    else {
      return;
    };

    let out = cwd.join(fuzz_dir).join("target").join(triple).join("release");
    std::fs::create_dir_all(out.join("deps")).unwrap();
    for name in &self.fuzz_outputs {
      write_executable(&out.join(name), format!("binary {}", name).as_bytes());
      std::fs::write(out.join(format!("{}.d", name)), "deps").unwrap();
    }
  }
}

impl CommandRunner for RecordingRunner {
  async fn run(&self, spec: &CommandSpec) -> Result<String, ExecuteError> {
    self.record(spec)
  }
}
