// src/exec/report.rs

//! Per-invocation run results.

use std::fmt;
use std::time::Duration;

use crate::errors::BuildflowError;
use crate::types::TaskName;

/// Final status of a task run or of a single leaf within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Outcome of one leaf inside a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafReport {
    pub name: TaskName,
    pub status: RunStatus,
    pub duration_ms: u64,
}

/// Result of `TaskRunner::run`. Created per invocation, reported, dropped.
#[derive(Debug)]
pub struct RunResult {
    pub task_name: TaskName,
    pub status: RunStatus,
    /// `ActionExecution` errors, in the order they happened.
    pub errors: Vec<BuildflowError>,
    pub duration_ms: u64,
    pub leaves: Vec<LeafReport>,
}

impl RunResult {
    pub(crate) fn new(task_name: impl Into<TaskName>) -> Self {
        Self {
            task_name: task_name.into(),
            status: RunStatus::Success,
            errors: Vec::new(),
            duration_ms: 0,
            leaves: Vec::new(),
        }
    }

    /// A run that did not execute anything.
    pub fn skipped(task_name: impl Into<TaskName>) -> Self {
        Self {
            status: RunStatus::Skipped,
            ..Self::new(task_name)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    /// Names of the leaves that ran successfully, in order.
    pub fn completed_leaves(&self) -> Vec<&str> {
        self.leaves_with(RunStatus::Success)
    }

    pub fn skipped_leaves(&self) -> Vec<&str> {
        self.leaves_with(RunStatus::Skipped)
    }

    fn leaves_with(&self, status: RunStatus) -> Vec<&str> {
        self.leaves
            .iter()
            .filter(|l| l.status == status)
            .map(|l| l.name.as_str())
            .collect()
    }
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
