//! Pipeline configuration.
//!
//! Configuration is read from an optional TOML file (`fuzzpack.toml` in the
//! source directory by default). Every field has a default, so an empty file
//! or no file at all describes the stock pipeline: Debian packages, rustup
//! over TLS 1.2+, the nightly channel, `cargo-fuzz`, and `./fuzz`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{
  CONFIG_FILE_NAME, DEFAULT_BASE_IMAGE, DEFAULT_CHANNEL, DEFAULT_EXCLUDES, DEFAULT_FUZZ_DIR, DEFAULT_INSTALLER_URL,
  DEFAULT_OUTPUT_DIR, DEFAULT_PACKAGE_MANAGER, DEFAULT_PACKAGES, DEFAULT_PLUGIN, DEFAULT_RUNTIME_IMAGE,
};

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid config: {0}")]
  Invalid(String),
}

/// Minimum TLS protocol version accepted when fetching the toolchain installer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsVersion {
  #[default]
  #[serde(rename = "1.2")]
  Tls12,
  #[serde(rename = "1.3")]
  Tls13,
}

impl TlsVersion {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Tls12 => "1.2",
      Self::Tls13 => "1.3",
    }
  }

  /// The matching `curl` flag, used when rendering a container recipe.
  pub fn curl_flag(&self) -> &'static str {
    match self {
      Self::Tls12 => "--tlsv1.2",
      Self::Tls13 => "--tlsv1.3",
    }
  }
}

/// Sanitizer passed to `cargo fuzz build`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sanitizer {
  #[default]
  Address,
  Leak,
  Memory,
  Thread,
  None,
}

impl Sanitizer {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Address => "address",
      Self::Leak => "leak",
      Self::Memory => "memory",
      Self::Thread => "thread",
      Self::None => "none",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
  /// Skip provisioning entirely when the host already has the packages.
  pub enabled: bool,
  pub package_manager: String,
  pub packages: Vec<String>,
}

impl Default for ProvisionConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      package_manager: DEFAULT_PACKAGE_MANAGER.to_string(),
      packages: DEFAULT_PACKAGES.iter().map(|p| p.to_string()).collect(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
  /// Install a stage-local toolchain; when false the host's rustup/cargo are used.
  pub install: bool,
  pub installer_url: String,
  /// Optional pin for the installer script contents (lowercase hex SHA-256).
  pub installer_sha256: Option<String>,
  pub min_tls: TlsVersion,
  pub channel: String,
}

impl Default for ToolchainConfig {
  fn default() -> Self {
    Self {
      install: true,
      installer_url: DEFAULT_INSTALLER_URL.to_string(),
      installer_sha256: None,
      min_tls: TlsVersion::default(),
      channel: DEFAULT_CHANNEL.to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginConfig {
  pub name: String,
  pub version: Option<String>,
}

impl Default for PluginConfig {
  fn default() -> Self {
    Self {
      name: DEFAULT_PLUGIN.to_string(),
      version: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
  /// Copy only the fuzz project and its path dependencies.
  pub scoped: bool,
  /// Extra paths (relative to the source root) copied in scoped mode.
  pub include: Vec<PathBuf>,
  /// File or directory names skipped at any depth.
  pub exclude: Vec<String>,
}

impl Default for SourceConfig {
  fn default() -> Self {
    Self {
      scoped: false,
      include: Vec::new(),
      exclude: DEFAULT_EXCLUDES.iter().map(|e| e.to_string()).collect(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
  /// Target triple; the host triple when unset.
  pub target: Option<String>,
  pub sanitizer: Sanitizer,
  /// Restrict the build to these fuzz targets; all declared targets when empty.
  pub targets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
  /// Fail instead of warning when the build produced no executables.
  pub require_artifacts: bool,
  /// Write the image root as a `.tar.gz` archive at this path.
  pub archive: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
  pub base_image: String,
  pub runtime_image: String,
}

impl Default for RenderConfig {
  fn default() -> Self {
    Self {
      base_image: DEFAULT_BASE_IMAGE.to_string(),
      runtime_image: DEFAULT_RUNTIME_IMAGE.to_string(),
    }
  }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
  /// Fuzz project directory, relative to the source root.
  #[serde(alias = "fuzz-dir")]
  pub fuzz_dir: PathBuf,
  /// Package stage root. Relative paths resolve against the working directory.
  #[serde(alias = "output-dir")]
  pub output_dir: PathBuf,
  pub provision: ProvisionConfig,
  pub toolchain: ToolchainConfig,
  pub plugin: PluginConfig,
  pub source: SourceConfig,
  pub build: BuildConfig,
  pub package: PackageConfig,
  pub render: RenderConfig,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      fuzz_dir: PathBuf::from(DEFAULT_FUZZ_DIR),
      output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
      provision: ProvisionConfig::default(),
      toolchain: ToolchainConfig::default(),
      plugin: PluginConfig::default(),
      source: SourceConfig::default(),
      build: BuildConfig::default(),
      package: PackageConfig::default(),
      render: RenderConfig::default(),
    }
  }
}

impl PipelineConfig {
  /// Parse configuration from TOML text. `origin` is only used in error messages.
  pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
      path: origin.to_path_buf(),
      source,
    })
  }

  /// Load configuration from a file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(path = %path.display(), "loaded config");
    Self::from_toml(&content, path)
  }

  /// Load `fuzzpack.toml` from the source directory, or defaults if absent.
  pub fn discover(source_dir: &Path) -> Result<Self, ConfigError> {
    let path = source_dir.join(CONFIG_FILE_NAME);
    if path.is_file() {
      Self::load(&path)
    } else {
      debug!(dir = %source_dir.display(), "no config file, using defaults");
      Ok(Self::default())
    }
  }

  /// Check invariants serde cannot express.
  pub fn validate(&self) -> Result<(), ConfigError> {
    check_relative("fuzz_dir", &self.fuzz_dir)?;
    for include in &self.source.include {
      check_relative("source.include", include)?;
    }

    if self.provision.enabled && self.provision.package_manager.trim().is_empty() {
      return Err(ConfigError::Invalid("provision.package_manager must not be empty".into()));
    }
    if self.toolchain.channel.trim().is_empty() {
      return Err(ConfigError::Invalid("toolchain.channel must not be empty".into()));
    }
    if self.plugin.name.trim().is_empty() {
      return Err(ConfigError::Invalid("plugin.name must not be empty".into()));
    }
    if let Some(sha) = &self.toolchain.installer_sha256 {
      if sha.len() != 64 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::Invalid(
          "toolchain.installer_sha256 must be a 64-character hex digest".into(),
        ));
      }
    }
    if let Some(target) = &self.build.target {
      if target.split('-').count() < 3 {
        return Err(ConfigError::Invalid(format!("build.target is not a target triple: {}", target)));
      }
    }

    Ok(())
  }
}

/// Paths inside the source tree must be relative and must not climb out of it.
fn check_relative(field: &str, path: &Path) -> Result<(), ConfigError> {
  if path.is_absolute() {
    return Err(ConfigError::Invalid(format!(
      "{} must be relative to the source root: {}",
      field,
      path.display()
    )));
  }
  if path.components().any(|c| matches!(c, Component::ParentDir)) {
    return Err(ConfigError::Invalid(format!(
      "{} must stay inside the source root: {}",
      field,
      path.display()
    )));
  }
  Ok(())
}
