//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding a source tree, an image
/// output path and a temp dir for builder stages.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create an empty test environment.
  ///
  /// Use this when you need to manually set up the directory structure.
  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// A source tree with a root crate and a fuzz project declaring `targets`.
  pub fn with_fuzz_project(targets: &[&str]) -> Self {
    let env = Self::empty();
    env.write_file(
      "repo/Cargo.toml",
      "[package]\nname = \"authenticator\"\nversion = \"0.1.0\"\n",
    );
    env.write_file("repo/src/lib.rs", "");

    let mut manifest = String::from(
      "[package]\nname = \"authenticator-fuzz\"\nversion = \"0.0.0\"\n\n[dependencies]\nauthenticator = { path = \"..\" }\n",
    );
    for target in targets {
      manifest.push_str(&format!(
        "\n[[bin]]\nname = \"{0}\"\npath = \"fuzz_targets/{0}.rs\"\n",
        target
      ));
      env.write_file(&format!("repo/fuzz/fuzz_targets/{}.rs", target), "");
    }
    env.write_file("repo/fuzz/Cargo.toml", &manifest);
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Source tree root.
  pub fn source_path(&self) -> PathBuf {
    let p = self.temp.path().join("repo");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Image root; not created here so tests can assert it stays absent.
  pub fn image_path(&self) -> PathBuf {
    self.temp.path().join("image")
  }

  /// Parent for builder stages, so leftovers are visible to tests.
  pub fn stage_path(&self) -> PathBuf {
    let p = self.temp.path().join("tmp");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Get a pre-configured Command for the fuzzpack binary.
  ///
  /// Sets environment variables for isolated testing:
  /// - `TMPDIR`: builder stages are created under [`Self::stage_path`]
  /// - `FUZZPACK_LOG`: keeps log output predictable
  pub fn fuzzpack_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("fuzzpack");
    cmd.env("TMPDIR", self.stage_path());
    cmd.env("FUZZPACK_LOG", "info");
    cmd
  }

  /// `fuzzpack build <source> --out <image> --target <triple>`.
  pub fn build_cmd(&self) -> Command {
    let mut cmd = self.fuzzpack_cmd();
    cmd
      .arg("build")
      .arg(self.source_path())
      .arg("--out")
      .arg(self.image_path())
      .args(["--target", "x86_64-unknown-linux-gnu"]);
    cmd
  }
}
