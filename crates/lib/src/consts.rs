//! Crate-wide constants and pipeline defaults.

pub const APP_NAME: &str = "fuzzpack";

/// Config file looked up in the source directory when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "fuzzpack.toml";

/// Environment variable holding the log filter (falls back to `RUST_LOG`).
pub const LOG_ENV: &str = "FUZZPACK_LOG";

pub const DEFAULT_FUZZ_DIR: &str = "./fuzz";
pub const DEFAULT_OUTPUT_DIR: &str = "./fuzzpack-image";

pub const DEFAULT_PACKAGE_MANAGER: &str = "apt-get";

/// Native packages the builder stage needs: build-configuration generator,
/// compiler front end, transfer client, toolchain configuration helper, and
/// headers for the system crypto and device-access libraries.
pub const DEFAULT_PACKAGES: &[&str] = &["cmake", "clang", "curl", "pkg-config", "libssl-dev", "libudev-dev"];

pub const DEFAULT_INSTALLER_URL: &str = "https://sh.rustup.rs";
pub const DEFAULT_CHANNEL: &str = "nightly";
pub const DEFAULT_PLUGIN: &str = "cargo-fuzz";

pub const DEFAULT_BASE_IMAGE: &str = "ubuntu:22.04";
pub const DEFAULT_RUNTIME_IMAGE: &str = "ubuntu:22.04";

/// Directory names never copied into the builder stage unless overridden.
pub const DEFAULT_EXCLUDES: &[&str] = &["target", ".git"];

/// Layout of the builder stage root.
pub const STAGE_SRC_DIR: &str = "src";
pub const STAGE_CARGO_HOME: &str = "cargo-home";
pub const STAGE_RUSTUP_HOME: &str = "rustup-home";
pub const STAGE_INSTALLER_FILE: &str = "rustup-init.sh";

/// cargo-fuzz writes its output below `<fuzz-dir>/target/<triple>/<profile>`.
pub const FUZZ_BUILD_ROOT: &str = "target";
pub const RELEASE_PROFILE: &str = "release";

/// Archive entry mtime: 1980-01-01 00:00:00 UTC (ZIP epoch).
pub const SOURCE_DATE_EPOCH: u64 = 315532800;
