//! Artifact extraction and the package stage.
//!
//! The package stage starts from an empty directory and receives only the
//! executables found at the top level of the fuzz build output. Dependency
//! info files, `deps/`, `build/` and anything else cargo leaves behind stay
//! in the builder stage and disappear with it.

pub mod archive;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::stage::StageLayout;
use crate::steps::build::BuildOutput;
use crate::util::hash::hash_file;

pub use archive::write_archive;

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("output directory {} is not empty (pass --force to replace it)", .0.display())]
  NotEmpty(PathBuf),

  #[error("output path {} is not a directory", .0.display())]
  NotADirectory(PathBuf),

  #[error("io error at {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("image contains a builder-stage entry: {}", .0.display())]
  Isolation(PathBuf),
}

impl PackageError {
  fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
    move |source| Self::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

/// One executable copied into the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
  pub name: String,
  pub size: u64,
  pub sha256: String,
}

/// The populated package-stage root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageImage {
  pub root: PathBuf,
  pub artifacts: Vec<Artifact>,
  /// Declared targets that produced no executable.
  pub missing: Vec<String>,
}

impl PackageImage {
  pub fn is_empty(&self) -> bool {
    self.artifacts.is_empty()
  }

  pub fn artifact_names(&self) -> Vec<&str> {
    self.artifacts.iter().map(|a| a.name.as_str()).collect()
  }
}

/// Fail early if the image root cannot be (re)created without `force`.
pub fn check_root(root: &Path, force: bool) -> Result<(), PackageError> {
  if !root.exists() {
    return Ok(());
  }
  if !root.is_dir() {
    return Err(PackageError::NotADirectory(root.to_path_buf()));
  }
  let non_empty = fs::read_dir(root).map_err(PackageError::io(root))?.next().is_some();
  if non_empty && !force {
    return Err(PackageError::NotEmpty(root.to_path_buf()));
  }
  Ok(())
}

/// Create a fresh, empty image root.
pub fn prepare_root(root: &Path, force: bool) -> Result<(), PackageError> {
  check_root(root, force)?;
  if root.exists() {
    fs::remove_dir_all(root).map_err(PackageError::io(root))?;
  }
  fs::create_dir_all(root).map_err(PackageError::io(root))?;
  debug!(root = %root.display(), "image root prepared");
  Ok(())
}

/// Executables at the top level of the build output, sorted by name.
///
/// A missing output directory yields an empty list; the caller decides
/// whether that is an error.
pub fn collect_artifacts(output: &BuildOutput) -> Result<Vec<PathBuf>, PackageError> {
  if !output.dir.is_dir() {
    warn!(dir = %output.dir.display(), "fuzz build output directory does not exist");
    return Ok(Vec::new());
  }

  let mut found = Vec::new();
  for entry in fs::read_dir(&output.dir).map_err(PackageError::io(&output.dir))? {
    let entry = entry.map_err(PackageError::io(&output.dir))?;
    let path = entry.path();
    let metadata = fs::metadata(&path).map_err(PackageError::io(&path))?;
    let name = entry.file_name().to_string_lossy().into_owned();

    if metadata.is_file() && is_fuzz_binary(&name, &metadata) {
      found.push(path);
    } else {
      debug!(path = %path.display(), "skipping non-artifact");
    }
  }
  found.sort();
  Ok(found)
}

fn is_fuzz_binary(name: &str, metadata: &fs::Metadata) -> bool {
  if name.starts_with('.') || name.ends_with(".d") {
    return false;
  }
  is_executable(name, metadata)
}

#[cfg(unix)]
fn is_executable(_name: &str, metadata: &fs::Metadata) -> bool {
  use std::os::unix::fs::PermissionsExt;
  metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(name: &str, _metadata: &fs::Metadata) -> bool {
  name.ends_with(".exe")
}

/// Target name of an artifact file (`fuzz_a.exe` -> `fuzz_a`).
fn target_name(file_name: &str) -> &str {
  file_name.strip_suffix(".exe").unwrap_or(file_name)
}

/// Copy the build's executables into a fresh image root.
///
/// `declared` lists the targets the fuzz project declares; any that did not
/// produce an executable are recorded in [`PackageImage::missing`].
pub fn package(
  output: &BuildOutput,
  root: &Path,
  declared: &[String],
  force: bool,
) -> Result<PackageImage, PackageError> {
  let sources = collect_artifacts(output)?;
  prepare_root(root, force)?;

  let mut artifacts = Vec::with_capacity(sources.len());
  for source in &sources {
    let name = source
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    let dest = root.join(&name);
    let size = fs::copy(source, &dest).map_err(PackageError::io(source))?;
    let sha256 = hash_file(&dest).map_err(PackageError::io(&dest))?;
    debug!(artifact = %name, size, "artifact extracted");
    artifacts.push(Artifact { name, size, sha256 });
  }

  let missing = declared
    .iter()
    .filter(|target| !artifacts.iter().any(|a| target_name(&a.name) == target.as_str()))
    .cloned()
    .collect::<Vec<_>>();

  for target in &missing {
    warn!(target = %target, "declared fuzz target produced no executable");
  }

  info!(root = %root.display(), artifacts = artifacts.len(), "package stage populated");

  Ok(PackageImage {
    root: root.to_path_buf(),
    artifacts,
    missing,
  })
}

/// Check that the image holds only the extracted executables.
///
/// Fails on any directory, symlink, unexpected file, or entry named after a
/// builder-stage directory.
pub fn verify_isolation(image: &PackageImage) -> Result<(), PackageError> {
  let private = StageLayout::private_names();

  for entry in WalkDir::new(&image.root).min_depth(1) {
    let entry = entry.map_err(|e| PackageError::Io {
      path: image.root.clone(),
      source: e.into(),
    })?;
    let name = entry.file_name().to_string_lossy();

    let expected = entry.depth() == 1
      && entry.file_type().is_file()
      && image.artifacts.iter().any(|a| a.name == name)
      && !private.iter().any(|p| *p == name);

    if !expected {
      return Err(PackageError::Isolation(entry.path().to_path_buf()));
    }
  }

  Ok(())
}
