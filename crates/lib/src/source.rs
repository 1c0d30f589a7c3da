//! Source materialization.
//!
//! Copies the project source into the builder stage. What gets copied is
//! described by a [`SourceManifest`]: either the whole tree (minus excluded
//! names) or only the fuzz project and the local crates it depends on.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::SourceConfig;
use crate::project::{FuzzProject, ProjectError, normalize};

#[derive(Debug, Error)]
pub enum SourceError {
  #[error("source directory not found: {}", .0.display())]
  MissingRoot(PathBuf),

  #[error("include path does not exist: {}", .0.display())]
  MissingInclude(PathBuf),

  #[error("include path escapes the source root: {}", .0.display())]
  EscapesRoot(PathBuf),

  #[error("failed to walk {}: {message}", path.display())]
  Walk { path: PathBuf, message: String },

  #[error("failed to copy {}: {source}", path.display())]
  Copy {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Project(#[from] ProjectError),
}

/// What part of the source tree enters the builder stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceManifest {
  /// Paths relative to the source root. An empty path means the whole tree.
  pub include: Vec<PathBuf>,
  /// File or directory names skipped at any depth.
  pub exclude: Vec<String>,
}

/// Counters reported after a copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeStats {
  pub files: u64,
  pub bytes: u64,
}

impl SourceManifest {
  /// Copy everything except the excluded names.
  pub fn wholesale(exclude: &[String]) -> Self {
    Self {
      include: vec![PathBuf::new()],
      exclude: exclude.to_vec(),
    }
  }

  /// Copy the fuzz project, its local path dependencies, and `extra` paths.
  pub fn scoped(
    source_root: &Path,
    project: &FuzzProject,
    extra: &[PathBuf],
    exclude: &[String],
  ) -> Result<Self, SourceError> {
    let mut include = project.local_crates(source_root)?;
    include.extend(extra.iter().map(|p| normalize(p)));

    Ok(Self {
      include: minimize(include),
      exclude: exclude.to_vec(),
    })
  }

  /// Build the manifest the configuration asks for.
  pub fn from_config(source_root: &Path, project: &FuzzProject, config: &SourceConfig) -> Result<Self, SourceError> {
    if config.scoped {
      Self::scoped(source_root, project, &config.include, &config.exclude)
    } else {
      Ok(Self::wholesale(&config.exclude))
    }
  }

  pub fn is_wholesale(&self) -> bool {
    self.include.iter().any(|p| p.as_os_str().is_empty())
  }

  fn is_excluded(&self, name: &str) -> bool {
    self.exclude.iter().any(|e| e == name)
  }

  /// Copy the selected paths from `source_root` into `dest`.
  ///
  /// Directory structure is preserved, so `crates/core` lands at
  /// `dest/crates/core`. File permissions are kept; symlinks are copied as
  /// links on Unix.
  pub fn materialize(&self, source_root: &Path, dest: &Path) -> Result<MaterializeStats, SourceError> {
    if !source_root.is_dir() {
      return Err(SourceError::MissingRoot(source_root.to_path_buf()));
    }

    let mut stats = MaterializeStats::default();
    fs::create_dir_all(dest).map_err(|source| SourceError::Copy {
      path: dest.to_path_buf(),
      source,
    })?;

    for include in &self.include {
      if normalize(include).starts_with("..") || include.is_absolute() {
        return Err(SourceError::EscapesRoot(include.clone()));
      }
      let from = source_root.join(include);
      if !from.exists() {
        return Err(SourceError::MissingInclude(include.clone()));
      }
      self.copy_tree(&from, &dest.join(include), &mut stats)?;
    }

    info!(
      files = stats.files,
      bytes = stats.bytes,
      wholesale = self.is_wholesale(),
      dest = %dest.display(),
      "source materialized"
    );

    Ok(stats)
  }

  fn copy_tree(&self, from: &Path, to: &Path, stats: &mut MaterializeStats) -> Result<(), SourceError> {
    let walker = WalkDir::new(from)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|e| {
        // the include root itself is never filtered
        e.depth() == 0
          || e
            .file_name()
            .to_str()
            .map(|name| !self.is_excluded(name))
            .unwrap_or(true)
      });

    for entry in walker {
      let entry = entry.map_err(|e| SourceError::Walk {
        path: from.to_path_buf(),
        message: e.to_string(),
      })?;

      let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
      let target = to.join(relative);
      let file_type = entry.file_type();
      let copy_err = |source| SourceError::Copy {
        path: entry.path().to_path_buf(),
        source,
      };

      if file_type.is_dir() {
        fs::create_dir_all(&target).map_err(copy_err)?;
      } else if file_type.is_symlink() {
        copy_symlink(entry.path(), &target).map_err(copy_err)?;
        stats.files += 1;
      } else {
        if let Some(parent) = target.parent() {
          fs::create_dir_all(parent).map_err(copy_err)?;
        }
        stats.bytes += fs::copy(entry.path(), &target).map_err(copy_err)?;
        stats.files += 1;
      }
    }

    debug!(from = %from.display(), to = %to.display(), "copied tree");
    Ok(())
  }
}

impl SourceManifest {
  /// Smallest list of paths that, each copied whole, reproduce what
  /// [`materialize`](Self::materialize) copies.
  ///
  /// A directory with an excluded entry anywhere below it is replaced by its
  /// non-excluded children, recursively. An empty path stands for the whole
  /// tree and only appears when nothing under it is excluded.
  pub fn copy_roots(&self, source_root: &Path) -> Result<Vec<PathBuf>, SourceError> {
    if !source_root.is_dir() {
      return Err(SourceError::MissingRoot(source_root.to_path_buf()));
    }

    let mut roots = Vec::new();
    for include in &self.include {
      if normalize(include).starts_with("..") || include.is_absolute() {
        return Err(SourceError::EscapesRoot(include.clone()));
      }
      let from = source_root.join(include);
      if !from.exists() {
        return Err(SourceError::MissingInclude(include.clone()));
      }
      let split = self.split_dirs(&from)?;
      self.cover(&from, include, Path::new(""), &split, &mut roots)?;
    }

    debug!(roots = roots.len(), "copy roots computed");
    Ok(roots)
  }

  /// Directories (relative to `from`) that contain an excluded entry.
  fn split_dirs(&self, from: &Path) -> Result<HashSet<PathBuf>, SourceError> {
    let mut split = HashSet::new();
    let mut walker = WalkDir::new(from).min_depth(1).into_iter();

    while let Some(entry) = walker.next() {
      let entry = entry.map_err(|e| SourceError::Walk {
        path: from.to_path_buf(),
        message: e.to_string(),
      })?;
      let excluded = entry.file_name().to_str().is_some_and(|name| self.is_excluded(name));
      if !excluded {
        continue;
      }
      if entry.file_type().is_dir() {
        walker.skip_current_dir();
      }
      let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
      split.extend(relative.ancestors().skip(1).map(Path::to_path_buf));
    }

    Ok(split)
  }

  fn cover(
    &self,
    from: &Path,
    include: &Path,
    relative: &Path,
    split: &HashSet<PathBuf>,
    roots: &mut Vec<PathBuf>,
  ) -> Result<(), SourceError> {
    if !split.contains(relative) {
      let root = if relative.as_os_str().is_empty() {
        include.to_path_buf()
      } else {
        include.join(relative)
      };
      roots.push(root);
      return Ok(());
    }

    let dir = from.join(relative);
    let read_err = |source| SourceError::Copy {
      path: dir.clone(),
      source,
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(&dir).map_err(read_err)? {
      names.push(entry.map_err(read_err)?.file_name());
    }
    names.sort();

    for name in names {
      if name.to_str().is_some_and(|n| self.is_excluded(n)) {
        continue;
      }
      self.cover(from, include, &relative.join(name), split, roots)?;
    }
    Ok(())
  }
}

/// Drop entries already covered by an ancestor entry.
fn minimize(mut include: Vec<PathBuf>) -> Vec<PathBuf> {
  include.sort();
  include.dedup();
  let mut kept: Vec<PathBuf> = Vec::new();
  for path in include {
    if !kept.iter().any(|k| path.starts_with(k)) {
      kept.push(path);
    }
  }
  kept
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
  let link = fs::read_link(from)?;
  if let Some(parent) = to.parent() {
    fs::create_dir_all(parent)?;
  }
  std::os::unix::fs::symlink(link, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
  fs::copy(from, to).map(|_| ())
}
