// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Configuration-time errors (`DuplicateTask`, `UnknownTask`, `CyclicTask`,
//! `ConfigValidation`, plus parse failures) are fatal and reported before any
//! task runs. `ActionExecution` is the only run-time variant; it wraps the
//! failure of a single leaf action.

use std::time::Duration;

use thiserror::Error;

use crate::types::TaskName;

#[derive(Error, Debug)]
pub enum BuildflowError {
    #[error("task '{0}' is already registered")]
    DuplicateTask(TaskName),

    #[error("task '{0}' is not defined")]
    UnknownTask(TaskName),

    #[error("cyclic task definition: {}", .cycle.join(" -> "))]
    CyclicTask { cycle: Vec<TaskName> },

    #[error("invalid configuration ({} issue(s)):\n{}", .issues.len(), format_issues(.issues))]
    ConfigValidation { issues: Vec<String> },

    #[error("task '{task}' failed after {}ms: {source:#}", .elapsed.as_millis())]
    ActionExecution {
        task: TaskName,
        elapsed: Duration,
        source: anyhow::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildflowError {
    /// Whether this error belongs to the configuration-time category.
    ///
    /// The CLI maps these to exit code 2; everything else exits with 1.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            BuildflowError::DuplicateTask(_)
                | BuildflowError::UnknownTask(_)
                | BuildflowError::CyclicTask { .. }
                | BuildflowError::ConfigValidation { .. }
                | BuildflowError::TomlError(_)
        )
    }

    /// Name of the leaf task for `ActionExecution` errors.
    pub fn failed_task(&self) -> Option<&str> {
        match self {
            BuildflowError::ActionExecution { task, .. } => Some(task),
            _ => None,
        }
    }
}

fn format_issues(issues: &[String]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildflowError>;
