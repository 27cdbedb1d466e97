// src/exec/runner.rs

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::actions::{ActionInput, ActionOutput};
use crate::dag::{Task, TaskKind, TaskRegistry};
use crate::errors::{BuildflowError, Result};
use crate::exec::report::{millis, LeafReport, RunResult, RunStatus};
use crate::fs::FileMatcher;
use crate::types::TaskName;

/// Executes tasks from a registry.
///
/// A run resolves the requested task into its leaves and executes them one
/// after another on the calling task. Later leaves usually depend on files
/// written by earlier ones, so there is no parallelism. The first failing
/// leaf aborts the run; the remaining leaves are reported as skipped and
/// nothing already written is rolled back.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    registry: Arc<TaskRegistry>,
    matcher: FileMatcher,
}

impl TaskRunner {
    pub fn new(registry: Arc<TaskRegistry>, matcher: FileMatcher) -> Self {
        Self { registry, matcher }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn matcher(&self) -> &FileMatcher {
        &self.matcher
    }

    /// Leaf names `name` resolves to, without running anything.
    pub fn plan(&self, name: &str) -> Result<Vec<TaskName>> {
        Ok(self
            .registry
            .resolve(name)?
            .into_iter()
            .map(|t| t.name().to_string())
            .collect())
    }

    /// Run a single task.
    ///
    /// Resolution errors (`UnknownTask`, `CyclicTask`) are returned as `Err`
    /// before any action runs. Action failures are reported inside the
    /// returned `RunResult`.
    pub async fn run(&self, name: &str) -> Result<RunResult> {
        let started = Instant::now();
        let leaves = self.registry.resolve(name)?;

        let leaf_names: Vec<&str> = leaves.iter().map(|t| t.name()).collect();
        info!(task = %name, leaves = ?leaf_names, "starting run");

        let mut result = RunResult::new(name);

        for leaf in leaves {
            if result.status == RunStatus::Failed {
                result.leaves.push(LeafReport {
                    name: leaf.name().to_string(),
                    status: RunStatus::Skipped,
                    duration_ms: 0,
                });
                continue;
            }

            let leaf_started = Instant::now();
            let outcome = self.execute_leaf(leaf).await;
            let elapsed = leaf_started.elapsed();

            match outcome {
                Ok(output) => {
                    debug!(
                        task = %leaf.name(),
                        written = output.written.len(),
                        removed = output.removed.len(),
                        elapsed_ms = millis(elapsed),
                        "leaf finished"
                    );
                    result.leaves.push(LeafReport {
                        name: leaf.name().to_string(),
                        status: RunStatus::Success,
                        duration_ms: millis(elapsed),
                    });
                }
                Err(source) => {
                    let err = BuildflowError::ActionExecution {
                        task: leaf.name().to_string(),
                        elapsed,
                        source,
                    };
                    error!(task = %name, leaf = %leaf.name(), error = %err, "leaf failed; aborting run");
                    result.leaves.push(LeafReport {
                        name: leaf.name().to_string(),
                        status: RunStatus::Failed,
                        duration_ms: millis(elapsed),
                    });
                    result.errors.push(err);
                    result.status = RunStatus::Failed;
                }
            }
        }

        result.duration_ms = millis(started.elapsed());
        info!(
            task = %name,
            status = %result.status,
            duration_ms = result.duration_ms,
            "run finished"
        );
        Ok(result)
    }

    /// Run several tasks in order, stopping after the first failed one.
    ///
    /// Tasks after a failure get a `skipped` result. Every name is resolved
    /// up front so an unknown or cyclic task fails before anything runs.
    pub async fn run_all(&self, names: &[TaskName]) -> Result<Vec<RunResult>> {
        for name in names {
            self.registry.resolve(name)?;
        }

        let mut results = Vec::with_capacity(names.len());
        let mut failed = false;
        for name in names {
            if failed {
                warn!(task = %name, "skipping task after earlier failure");
                results.push(RunResult::skipped(name.as_str()));
                continue;
            }
            let result = self.run(name).await?;
            failed = result.is_failed();
            results.push(result);
        }
        Ok(results)
    }

    async fn execute_leaf(&self, leaf: &Task) -> anyhow::Result<ActionOutput> {
        let TaskKind::Leaf { action, options } = leaf.kind() else {
            // `resolve` only ever yields leaves.
            anyhow::bail!("task '{}' is not a leaf", leaf.name());
        };

        info!(
            task = %leaf.name(),
            kind = %action.kind(),
            "running leaf"
        );

        action
            .execute(ActionInput {
                task: leaf.name(),
                matcher: &self.matcher,
                options,
            })
            .await
    }
}
