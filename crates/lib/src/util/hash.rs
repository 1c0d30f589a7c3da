//! SHA-256 helpers for artifact and installer digests.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

/// Lowercase hex SHA-256 of a file, read in chunks.
pub fn hash_file(path: &Path) -> io::Result<String> {
  let mut file = File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];
  loop {
    let n = file.read(&mut buffer)?;
    if n == 0 {
      break;
    }
    hasher.update(&buffer[..n]);
  }
  Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn hash_bytes_known_value() {
    assert_eq!(
      hash_bytes(b"hello"),
      "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
  }

  #[test]
  fn hash_file_matches_hash_bytes() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.bin");
    let content = vec![7u8; 20_000];
    std::fs::write(&path, &content).unwrap();

    assert_eq!(hash_file(&path).unwrap(), hash_bytes(&content));
  }

  #[test]
  fn hash_file_missing_is_error() {
    let temp = TempDir::new().unwrap();
    assert!(hash_file(&temp.path().join("missing")).is_err());
  }
}
