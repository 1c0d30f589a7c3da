//! Host platform detection.
//!
//! The fuzz build is always invoked with an explicit `--target`, so the
//! output directory (`<fuzz-dir>/target/<triple>/release`) is known before
//! compilation starts. The default triple is the host's.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  X86_64,
  Aarch64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Arch {
  fn detect() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::X86_64),
      "aarch64" => Some(Self::Aarch64),
      _ => None,
    }
  }

  /// First component of a target triple.
  pub fn triple_prefix(&self) -> &'static str {
    match self {
      Self::X86_64 => "x86_64",
      Self::Aarch64 => "aarch64",
    }
  }
}

impl Os {
  fn detect() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Windows => "windows",
    }
  }

  /// Vendor, system and ABI components of a target triple.
  pub fn triple_suffix(&self) -> &'static str {
    match self {
      Self::Linux => "unknown-linux-gnu",
      Self::MacOs => "apple-darwin",
      Self::Windows => "pc-windows-msvc",
    }
  }
}

/// Architecture and OS of a build host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// The running host, or `None` on an unsupported OS/architecture.
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::detect()?,
      os: Os::detect()?,
    })
  }

  /// Short name such as `aarch64-darwin`.
  pub fn short_name(&self) -> String {
    format!("{}-{}", self.arch.triple_prefix(), self.os.name())
  }

  pub fn target_triple(&self) -> String {
    format!("{}-{}", self.arch.triple_prefix(), self.os.triple_suffix())
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.short_name())
  }
}

/// Target triple of the host, if supported.
pub fn host_triple() -> Option<String> {
  Platform::current().map(|p| p.target_triple())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn target_triple_format() {
    let platform = Platform::new(Arch::X86_64, Os::Linux);
    assert_eq!(platform.target_triple(), "x86_64-unknown-linux-gnu");

    let platform = Platform::new(Arch::Aarch64, Os::MacOs);
    assert_eq!(platform.target_triple(), "aarch64-apple-darwin");

    let platform = Platform::new(Arch::X86_64, Os::Windows);
    assert_eq!(platform.target_triple(), "x86_64-pc-windows-msvc");
  }

  #[test]
  fn short_name_format() {
    let platform = Platform::new(Arch::Aarch64, Os::Linux);
    assert_eq!(platform.short_name(), "aarch64-linux");
    assert_eq!(platform.to_string(), "aarch64-linux");
  }

  #[test]
  fn host_triple_matches_current_platform() {
    let triple = host_triple().expect("host platform should be supported");
    assert!(triple.starts_with(std::env::consts::ARCH));
  }
}
