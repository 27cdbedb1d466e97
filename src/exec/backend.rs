// src/exec/backend.rs

//! How a watch group executes its bound tasks.
//!
//! Watch groups talk to a [`RunBackend`] instead of a `TaskRunner` directly,
//! so the spawn policy is a choice of backend and tests can swap in a fake.
//!
//! - [`InProcessBackend`] runs the tasks on a shared [`TaskRunner`].
//! - [`SubprocessBackend`] re-invokes the current executable once per task
//!   (`<exe> --config <file> run <task>`), so every run starts from freshly
//!   loaded configuration and a clean process.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::actions::tool::detach_from_terminal_signals;
use crate::errors::Result;
use crate::exec::report::RunStatus;
use crate::exec::runner::TaskRunner;
use crate::types::TaskName;

/// Trait abstracting how a group's bound tasks are executed.
///
/// Implementations run `tasks` in order and stop at the first failure.
/// The returned status is `Failed` if any task failed. `Err` is reserved
/// for problems that prevented running at all.
pub trait RunBackend: Send + Sync {
    fn run_tasks(
        &self,
        tasks: Vec<TaskName>,
    ) -> Pin<Box<dyn Future<Output = Result<RunStatus>> + Send + '_>>;
}

/// Runs tasks inside the watching process.
#[derive(Debug, Clone)]
pub struct InProcessBackend {
    runner: Arc<TaskRunner>,
}

impl InProcessBackend {
    pub fn new(runner: Arc<TaskRunner>) -> Self {
        Self { runner }
    }
}

impl RunBackend for InProcessBackend {
    fn run_tasks(
        &self,
        tasks: Vec<TaskName>,
    ) -> Pin<Box<dyn Future<Output = Result<RunStatus>> + Send + '_>> {
        Box::pin(async move {
            let results = self.runner.run_all(&tasks).await?;
            let status = if results.iter().any(|r| r.is_failed()) {
                RunStatus::Failed
            } else {
                RunStatus::Success
            };
            Ok(status)
        })
    }
}

/// Runs each task in a child `buildflow` process.
#[derive(Debug, Clone)]
pub struct SubprocessBackend {
    exe: PathBuf,
    config: PathBuf,
}

impl SubprocessBackend {
    pub fn new(exe: impl Into<PathBuf>, config: impl Into<PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            config: config.into(),
        }
    }

    /// Backend that re-invokes the running binary.
    pub fn current_exe(config: impl Into<PathBuf>) -> Result<Self> {
        let exe = std::env::current_exe().context("locating the buildflow executable")?;
        Ok(Self::new(exe, config))
    }

    async fn run_one(&self, task: &str) -> Result<bool> {
        debug!(task = %task, exe = ?self.exe, config = ?self.config, "spawning child run");

        let mut command = Command::new(&self.exe);
        command
            .arg("--config")
            .arg(&self.config)
            .arg("run")
            .arg(task)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        detach_from_terminal_signals(&mut command);

        let status = command
            .status()
            .await
            .with_context(|| format!("spawning child process for task '{task}'"))?;

        if status.success() {
            Ok(true)
        } else {
            warn!(task = %task, code = ?status.code(), "child run failed");
            Ok(false)
        }
    }
}

impl RunBackend for SubprocessBackend {
    fn run_tasks(
        &self,
        tasks: Vec<TaskName>,
    ) -> Pin<Box<dyn Future<Output = Result<RunStatus>> + Send + '_>> {
        Box::pin(async move {
            for task in tasks.iter() {
                if !self.run_one(task).await? {
                    return Ok(RunStatus::Failed);
                }
            }
            info!(tasks = ?tasks, "child runs finished");
            Ok(RunStatus::Success)
        })
    }
}
