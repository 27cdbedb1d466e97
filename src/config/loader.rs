// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// File name looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "Buildflow.toml";

/// Parse configuration text into a `RawConfigFile`.
///
/// Only TOML deserialization happens here; see [`load_and_validate`] for the
/// semantic checks.
pub fn parse_str(contents: &str) -> Result<RawConfigFile> {
    Ok(toml::from_str(contents)?)
}

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_str(&contents)
}

/// Load a configuration file from path and validate it.
///
/// This is the recommended entry point for the rest of the application:
/// it reads TOML, applies serde defaults, then checks every task reference,
/// alias cycles, glob patterns and durations, reporting all problems at once.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    ConfigFile::try_from(raw_config)
}
