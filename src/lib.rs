// src/lib.rs

pub mod actions;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod types;
pub mod watch;

use std::fmt::Write as _;

use tokio::sync::watch as flag;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::dag::TaskKind;
use crate::errors::{BuildflowError, Result};
use crate::exec::{RunResult, RunStatus};
use crate::pipeline::Pipeline;
use crate::types::DEFAULT_TASK;

/// What a CLI invocation amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Skipped,
    Failed,
}

impl RunOutcome {
    pub fn exit_code(self) -> u8 {
        match self {
            RunOutcome::Success | RunOutcome::Skipped => 0,
            RunOutcome::Failed => 1,
        }
    }
}

impl From<RunStatus> for RunOutcome {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Success => RunOutcome::Success,
            RunStatus::Skipped => RunOutcome::Skipped,
            RunStatus::Failed => RunOutcome::Failed,
        }
    }
}

/// Exit code for an invocation that ended in an error.
///
/// Configuration problems exit with 2, everything else with 1.
pub fn error_exit_code(err: &BuildflowError) -> u8 {
    if err.is_config_error() { 2 } else { 1 }
}

/// High-level entry point used by `main.rs`.
///
/// Loads the configuration, then dispatches to `run`, `watch` or `list`.
/// Watching ends on Ctrl-C or SIGTERM.
pub async fn run(args: CliArgs) -> Result<RunOutcome> {
    let pipeline = Pipeline::load(&args.config)?;
    debug!(config = ?args.config, base = ?pipeline.base_dir(), "configuration loaded");

    match args.command {
        None => run_once(&pipeline, None, false).await,
        Some(Command::Run { task, dry_run }) => run_once(&pipeline, task.as_deref(), dry_run).await,
        Some(Command::Watch) => {
            let (tx, rx) = flag::channel(false);
            tokio::spawn(async move {
                wait_for_shutdown().await;
                info!("shutdown requested; letting in-flight runs finish");
                let _ = tx.send(true);
            });
            pipeline.watch(rx).await?;
            Ok(RunOutcome::Success)
        }
        Some(Command::List) => {
            print!("{}", format_listing(&pipeline));
            Ok(RunOutcome::Success)
        }
    }
}

async fn run_once(pipeline: &Pipeline, task: Option<&str>, dry_run: bool) -> Result<RunOutcome> {
    if dry_run {
        let name = task.unwrap_or(DEFAULT_TASK);
        if task.is_none() && !pipeline.registry().contains(DEFAULT_TASK) {
            println!("no '{DEFAULT_TASK}' task defined; nothing to run");
            return Ok(RunOutcome::Skipped);
        }
        print!("{}", format_plan(name, &pipeline.plan(name)?));
        return Ok(RunOutcome::Success);
    }

    let result = match task {
        Some(name) => pipeline.run_task(name).await?,
        None => pipeline.run_default().await?,
    };
    report(&result);
    Ok(result.status.into())
}

fn report(result: &RunResult) {
    for err in result.errors.iter() {
        eprintln!("buildflow: {err}");
    }
    let skipped = result.skipped_leaves();
    if !skipped.is_empty() {
        eprintln!("buildflow: skipped after failure: {}", skipped.join(", "));
    }
}

/// The dry-run plan: one leaf per line, in execution order.
pub fn format_plan(task: &str, leaves: &[String]) -> String {
    let mut out = format!("{task} resolves to {} leaf task(s):\n", leaves.len());
    for (i, leaf) in leaves.iter().enumerate() {
        let _ = writeln!(out, "  {}. {leaf}", i + 1);
    }
    out
}

/// Tasks and watch groups, as printed by `buildflow list`.
pub fn format_listing(pipeline: &Pipeline) -> String {
    let registry = pipeline.registry();
    let mut out = format!("tasks ({}):\n", registry.len());
    for task in registry.tasks() {
        match task.kind() {
            TaskKind::Alias { members } => {
                let _ = writeln!(out, "  {} [alias] -> {}", task.name(), members.join(", "));
            }
            TaskKind::Leaf { action, .. } => {
                let _ = writeln!(
                    out,
                    "  {} [{}] {}",
                    task.name(),
                    action.kind(),
                    action.summary()
                );
            }
        }
    }

    let groups = pipeline.watch_groups();
    let _ = writeln!(out, "watch groups ({}):", groups.len());
    for group in groups {
        let _ = writeln!(
            out,
            "  {} [{}, debounce {}ms{}] {} -> {}",
            group.id(),
            group.spawn(),
            group.debounce().as_millis(),
            if group.use_hash() { ", use_hash" } else { "" },
            group.file_set().patterns().join(", "),
            group.bound_tasks().join(", ")
        );
    }
    out
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if let Err(e) = res {
                            warn!("failed to listen for Ctrl+C: {e}");
                            term.recv().await;
                        }
                    }
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!("failed to listen for SIGTERM: {e}"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}
