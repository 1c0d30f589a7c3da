//! Builder stage environment.
//!
//! The builder stage is a temporary directory that holds everything the
//! build needs and nothing the final image keeps:
//!
//! ```text
//! <stage>/
//!   src/            materialized source tree (working directory of the build)
//!   cargo-home/     CARGO_HOME of the stage-local toolchain
//!   rustup-home/    RUSTUP_HOME of the stage-local toolchain
//!   rustup-init.sh  downloaded installer
//! ```
//!
//! Dropping a [`BuilderStage`] removes the directory.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::consts::{APP_NAME, STAGE_CARGO_HOME, STAGE_INSTALLER_FILE, STAGE_RUSTUP_HOME, STAGE_SRC_DIR};
use crate::execute::CommandSpec;

/// Path layout of a builder stage rooted at `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLayout {
  root: PathBuf,
}

impl StageLayout {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn src_dir(&self) -> PathBuf {
    self.root.join(STAGE_SRC_DIR)
  }

  pub fn cargo_home(&self) -> PathBuf {
    self.root.join(STAGE_CARGO_HOME)
  }

  pub fn rustup_home(&self) -> PathBuf {
    self.root.join(STAGE_RUSTUP_HOME)
  }

  pub fn installer_path(&self) -> PathBuf {
    self.root.join(STAGE_INSTALLER_FILE)
  }

  /// Names of stage directories that must never show up in the final image.
  pub fn private_names() -> &'static [&'static str] {
    &[STAGE_SRC_DIR, STAGE_CARGO_HOME, STAGE_RUSTUP_HOME]
  }
}

/// A live builder stage backed by a temporary directory.
#[derive(Debug)]
pub struct BuilderStage {
  dir: TempDir,
  layout: StageLayout,
}

impl BuilderStage {
  /// Create a stage under the system temp directory.
  ///
  /// With `keep` set the directory survives the stage (for debugging a
  /// failed build).
  pub fn create(keep: bool) -> io::Result<Self> {
    Self::create_in(&std::env::temp_dir(), keep)
  }

  pub fn create_in(parent: &Path, keep: bool) -> io::Result<Self> {
    let dir = tempfile::Builder::new()
      .prefix(&format!("{}-builder-", APP_NAME))
      .disable_cleanup(keep)
      .tempdir_in(parent)?;
    let layout = StageLayout::new(dir.path());
    std::fs::create_dir_all(layout.src_dir())?;

    info!(root = %layout.root().display(), keep, "builder stage created");
    Ok(Self { dir, layout })
  }

  pub fn layout(&self) -> &StageLayout {
    &self.layout
  }

  pub fn root(&self) -> &Path {
    self.dir.path()
  }
}

impl Drop for BuilderStage {
  fn drop(&mut self) {
    debug!(root = %self.layout.root().display(), "tearing down builder stage");
  }
}

/// The toolchain selected for the rest of the builder stage.
///
/// Instead of changing a process-wide default, the channel and tool homes are
/// carried in this value and applied to each command that needs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainEnv {
  /// `None` when the host's toolchain is used.
  pub cargo_home: Option<PathBuf>,
  pub rustup_home: Option<PathBuf>,
  pub channel: String,
}

impl ToolchainEnv {
  /// Toolchain installed inside the stage.
  pub fn staged(layout: &StageLayout, channel: &str) -> Self {
    Self {
      cargo_home: Some(layout.cargo_home()),
      rustup_home: Some(layout.rustup_home()),
      channel: channel.to_string(),
    }
  }

  /// Toolchain already present on the host.
  pub fn host(channel: &str) -> Self {
    Self {
      cargo_home: None,
      rustup_home: None,
      channel: channel.to_string(),
    }
  }

  fn tool(&self, name: &str) -> String {
    match &self.cargo_home {
      Some(home) => home.join("bin").join(name).to_string_lossy().into_owned(),
      None => name.to_string(),
    }
  }

  pub fn cargo(&self) -> String {
    self.tool("cargo")
  }

  pub fn rustup(&self) -> String {
    self.tool("rustup")
  }

  /// Command with only the tool homes set; the channel is left alone so
  /// rustup itself can be bootstrapped.
  pub fn apply_homes(&self, mut spec: CommandSpec) -> CommandSpec {
    if let Some(home) = &self.cargo_home {
      spec = spec.env("CARGO_HOME", home.to_string_lossy());
      if let Some(path) = prepend_path(&home.join("bin")) {
        spec = spec.env("PATH", path.to_string_lossy());
      }
    }
    if let Some(home) = &self.rustup_home {
      spec = spec.env("RUSTUP_HOME", home.to_string_lossy());
    }
    spec
  }

  /// Command scoped to this toolchain, channel included.
  pub fn apply(&self, spec: CommandSpec) -> CommandSpec {
    self.apply_homes(spec).env("RUSTUP_TOOLCHAIN", self.channel.as_str())
  }
}

/// `dir` followed by the current PATH.
fn prepend_path(dir: &Path) -> Option<OsString> {
  let mut entries = vec![dir.to_path_buf()];
  if let Some(current) = std::env::var_os("PATH") {
    entries.extend(std::env::split_paths(&current));
  }
  std::env::join_paths(entries).ok()
}

#[cfg(test)]
#[cfg(not(windows))]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  fn layout_paths() {
    let layout = StageLayout::new("/stage");
    assert_eq!(layout.src_dir(), PathBuf::from("/stage/src"));
    assert_eq!(layout.cargo_home(), PathBuf::from("/stage/cargo-home"));
    assert_eq!(layout.rustup_home(), PathBuf::from("/stage/rustup-home"));
    assert_eq!(layout.installer_path(), PathBuf::from("/stage/rustup-init.sh"));
  }

  #[test]
  fn stage_is_removed_on_drop() {
    let parent = tempfile::tempdir().unwrap();
    let root = {
      let stage = BuilderStage::create_in(parent.path(), false).unwrap();
      assert!(stage.layout().src_dir().is_dir());
      stage.root().to_path_buf()
    };
    assert!(!root.exists());
  }

  #[test]
  fn kept_stage_survives_drop() {
    let parent = tempfile::tempdir().unwrap();
    let root = {
      let stage = BuilderStage::create_in(parent.path(), true).unwrap();
      stage.root().to_path_buf()
    };
    assert!(root.exists());
  }

  #[test]
  fn staged_toolchain_uses_stage_binaries() {
    let layout = StageLayout::new("/stage");
    let env = ToolchainEnv::staged(&layout, "nightly");
    assert_eq!(env.cargo(), "/stage/cargo-home/bin/cargo");
    assert_eq!(env.rustup(), "/stage/cargo-home/bin/rustup");
  }

  #[test]
  fn host_toolchain_uses_path_lookup() {
    let env = ToolchainEnv::host("nightly");
    assert_eq!(env.cargo(), "cargo");
    let spec = env.apply(CommandSpec::new("cargo"));
    assert_eq!(spec.env.get("RUSTUP_TOOLCHAIN").map(String::as_str), Some("nightly"));
    assert!(!spec.env.contains_key("CARGO_HOME"));
    assert!(!spec.env.contains_key("PATH"));
  }

  #[test]
  #[serial]
  fn staged_toolchain_scopes_environment() {
    temp_env::with_var("PATH", Some("/usr/bin:/bin"), || {
      let env = ToolchainEnv::staged(&StageLayout::new("/stage"), "nightly-2024-01-01");
      let spec = env.apply(CommandSpec::new("cargo"));
      assert_eq!(spec.env["CARGO_HOME"], "/stage/cargo-home");
      assert_eq!(spec.env["RUSTUP_HOME"], "/stage/rustup-home");
      assert_eq!(spec.env["RUSTUP_TOOLCHAIN"], "nightly-2024-01-01");
      assert_eq!(spec.env["PATH"], "/stage/cargo-home/bin:/usr/bin:/bin");
    });
  }

  #[test]
  fn apply_homes_leaves_channel_unset() {
    let env = ToolchainEnv::staged(&StageLayout::new("/stage"), "nightly");
    let spec = env.apply_homes(CommandSpec::new("sh"));
    assert!(!spec.env.contains_key("RUSTUP_TOOLCHAIN"));
  }
}
