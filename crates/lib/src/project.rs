//! Fuzz project inspection.
//!
//! The fuzz project is owned by the library under test; this module only
//! reads its `Cargo.toml` to learn which fuzz targets it declares and which
//! local crates it depends on through `path` dependencies.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProjectError {
  #[error("fuzz project manifest not found: {}", .0.display())]
  ManifestNotFound(PathBuf),

  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("path dependency {} is outside the source root", .0.display())]
  OutsideSource(PathBuf),

  #[error("fuzz target {0:?} is not declared by the fuzz project")]
  UnknownTarget(String),
}

/// A fuzz target declared as a `[[bin]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FuzzTarget {
  pub name: String,
  pub path: Option<PathBuf>,
}

/// The parsed fuzz project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FuzzProject {
  /// Absolute path of the fuzz project directory.
  pub dir: PathBuf,
  pub name: Option<String>,
  pub targets: Vec<FuzzTarget>,
}

#[derive(Debug, Deserialize)]
struct CargoManifest {
  package: Option<CargoPackage>,
  #[serde(default)]
  bin: Vec<CargoBin>,
  #[serde(default)]
  dependencies: BTreeMap<String, toml::Value>,
  #[serde(default, rename = "dev-dependencies")]
  dev_dependencies: BTreeMap<String, toml::Value>,
  #[serde(default, rename = "build-dependencies")]
  build_dependencies: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
struct CargoPackage {
  name: String,
}

#[derive(Debug, Deserialize)]
struct CargoBin {
  name: String,
  path: Option<PathBuf>,
}

impl CargoManifest {
  fn read(dir: &Path) -> Result<Self, ProjectError> {
    let path = dir.join("Cargo.toml");
    if !path.is_file() {
      return Err(ProjectError::ManifestNotFound(path));
    }
    let content = fs::read_to_string(&path).map_err(|source| ProjectError::Read {
      path: path.clone(),
      source,
    })?;
    toml::from_str(&content).map_err(|source| ProjectError::Parse { path, source })
  }

  /// `path = "..."` values of all dependency tables, relative to the crate.
  fn path_dependencies(&self) -> Vec<PathBuf> {
    self
      .dependencies
      .values()
      .chain(self.dev_dependencies.values())
      .chain(self.build_dependencies.values())
      .filter_map(|dep| dep.get("path").and_then(|p| p.as_str()))
      .map(PathBuf::from)
      .collect()
  }
}

impl FuzzProject {
  /// Read the fuzz project at `source_root/fuzz_dir`.
  pub fn load(source_root: &Path, fuzz_dir: &Path) -> Result<Self, ProjectError> {
    let dir = normalize(&source_root.join(fuzz_dir));
    let manifest = CargoManifest::read(&dir)?;

    let targets = manifest
      .bin
      .into_iter()
      .map(|bin| FuzzTarget {
        name: bin.name,
        path: bin.path,
      })
      .collect::<Vec<_>>();

    debug!(dir = %dir.display(), targets = targets.len(), "loaded fuzz project");

    Ok(Self {
      dir,
      name: manifest.package.map(|p| p.name),
      targets,
    })
  }

  pub fn target_names(&self) -> Vec<String> {
    self.targets.iter().map(|t| t.name.clone()).collect()
  }

  /// Check that every requested target is declared.
  pub fn check_targets(&self, requested: &[String]) -> Result<(), ProjectError> {
    for name in requested {
      if !self.targets.iter().any(|t| &t.name == name) {
        return Err(ProjectError::UnknownTarget(name.clone()));
      }
    }
    Ok(())
  }

  /// Crate directories the fuzz project needs, relative to `source_root`.
  ///
  /// Starts at the fuzz project and follows `path` dependencies transitively.
  /// The fuzz project itself is always the first entry.
  pub fn local_crates(&self, source_root: &Path) -> Result<Vec<PathBuf>, ProjectError> {
    let root = normalize(source_root);
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    let mut queue = VecDeque::from([self.dir.clone()]);

    while let Some(dir) = queue.pop_front() {
      let relative = dir
        .strip_prefix(&root)
        .ok()
        .filter(|rel| !escapes(rel))
        .ok_or_else(|| ProjectError::OutsideSource(dir.clone()))?
        .to_path_buf();
      if !seen.insert(relative.clone()) {
        continue;
      }
      ordered.push(relative);

      let manifest = CargoManifest::read(&dir)?;
      for dep in manifest.path_dependencies() {
        queue.push_back(normalize(&dir.join(dep)));
      }
    }

    Ok(ordered)
  }
}

/// A stripped path still leaves the root when the root was relative and
/// normalized to nothing, e.g. `.`.
fn escapes(relative: &Path) -> bool {
  relative.has_root() || matches!(relative.components().next(), Some(Component::ParentDir | Component::Prefix(_)))
}

/// Lexically resolve `.` and `..` without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !out.pop() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}
