//! fuzzpack-lib: build fuzz harnesses and package the binaries into a minimal image.
//!
//! The pipeline runs two stages:
//! - a disposable builder stage that provisions native packages, installs a
//!   toolchain and the fuzz-build plugin, copies the source tree and compiles
//!   the fuzz targets
//! - a package stage that receives only the compiled fuzz executables
//!
//! Entry point is [`pipeline::Pipeline`]; [`pipeline::plan`] and
//! [`render::render_containerfile`] describe a run without executing it.

pub mod config;
pub mod consts;
pub mod execute;
pub mod package;
pub mod pipeline;
pub mod platform;
pub mod project;
pub mod render;
pub mod source;
pub mod stage;
pub mod steps;
pub mod util;
