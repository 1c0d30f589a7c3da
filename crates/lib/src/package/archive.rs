//! Image archive writer.
//!
//! Writes the package root as a gzip-compressed tarball with every entry at
//! the archive root. Entry mtimes are normalized so identical binaries give
//! identical archives.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::info;

use crate::consts::SOURCE_DATE_EPOCH;
use crate::package::Artifact;

/// Write `artifacts` (files directly under `root`) to a `.tar.gz` at `dest`.
pub fn write_archive(root: &Path, artifacts: &[Artifact], dest: &Path) -> io::Result<()> {
  if let Some(parent) = dest.parent() {
    if !parent.as_os_str().is_empty() {
      fs::create_dir_all(parent)?;
    }
  }

  let encoder = GzEncoder::new(File::create(dest)?, Compression::default());
  let mut builder = tar::Builder::new(encoder);

  for artifact in artifacts {
    let path = root.join(&artifact.name);
    let file = File::open(&path)?;
    let metadata = file.metadata()?;

    let mut header = tar::Header::new_gnu();
    header.set_size(metadata.len());
    header.set_mode(file_mode(&metadata));
    header.set_mtime(SOURCE_DATE_EPOCH);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    builder.append_data(&mut header, &artifact.name, file)?;
  }

  builder.into_inner()?.finish()?;
  info!(path = %dest.display(), entries = artifacts.len(), "image archive written");
  Ok(())
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
  0o755
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::write_executable;
  use flate2::read::GzDecoder;
  use tempfile::TempDir;

  fn artifact(name: &str) -> Artifact {
    Artifact {
      name: name.to_string(),
      size: 0,
      sha256: String::new(),
    }
  }

  #[test]
  fn archive_contains_flat_entries_with_fixed_mtime() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("image");
    write_executable(&root.join("fuzz_register"), b"one");
    write_executable(&root.join("fuzz_sign"), b"two");
    let dest = temp.path().join("out/image.tar.gz");

    write_archive(&root, &[artifact("fuzz_register"), artifact("fuzz_sign")], &dest).unwrap();

    let mut archive = tar::Archive::new(GzDecoder::new(File::open(&dest).unwrap()));
    let mut names = Vec::new();
    for entry in archive.entries().unwrap() {
      let entry = entry.unwrap();
      assert_eq!(entry.header().mtime().unwrap(), SOURCE_DATE_EPOCH);
      #[cfg(unix)]
      assert_eq!(entry.header().mode().unwrap() & 0o777, 0o755);
      names.push(entry.path().unwrap().to_string_lossy().into_owned());
    }
    assert_eq!(names, vec!["fuzz_register", "fuzz_sign"]);
  }

  #[test]
  fn empty_image_gives_empty_archive() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("image.tar.gz");

    write_archive(temp.path(), &[], &dest).unwrap();

    let mut archive = tar::Archive::new(GzDecoder::new(File::open(&dest).unwrap()));
    assert_eq!(archive.entries().unwrap().count(), 0);
  }
}
