// src/config/mod.rs

//! Configuration loading and validation for buildflow.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate task references, alias cycles, globs and durations
//!   (`validate.rs`), reporting every problem in one error.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str, DEFAULT_CONFIG_FILE};
pub use model::{
    BundleSpec, CleanSpec, CompileSpec, ConfigFile, MinifySpec, OutputSpec, RawConfigFile,
    TaskSpec, WatchGroupConfig, WatchGroupSpec, DEFAULT_DEBOUNCE,
};
