// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;

/// Command-line arguments for `buildflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildflow",
    version,
    about = "Run build tasks from a task graph and re-run them when files change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Patterns in the file are relative to its directory.
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDFLOW_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Defaults to `run` of the `default` task.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a task (or `default`) once.
    Run {
        /// Task to run. Without it, `default` runs if defined.
        task: Option<String>,

        /// Print the resolved leaf tasks without running them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Watch all configured groups until interrupted.
    Watch,
    /// List tasks and watch groups.
    List,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
