// src/pipeline.rs

//! Builds the task registry and watch groups from configuration and exposes
//! the top-level operations: running a task, running `default`, and watching.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::actions;
use crate::config::{load_and_validate, ConfigFile, RawConfigFile, TaskSpec};
use crate::dag::{Task, TaskRegistry};
use crate::engine::{GroupRuntime, GroupStats, RunGate, ShutdownSignal};
use crate::errors::{BuildflowError, Result};
use crate::exec::{InProcessBackend, RunBackend, RunResult, SubprocessBackend, TaskRunner};
use crate::fs::{FileMatcher, FileSystem, RealFileSystem};
use crate::types::{SpawnPolicy, TaskName, DEFAULT_TASK};
use crate::watch::{spawn_watcher, ContentHasher, GroupRoute, WatchGroup};

/// A loaded build: tasks, watch groups and the runner that executes them.
#[derive(Debug)]
pub struct Pipeline {
    runner: Arc<TaskRunner>,
    groups: Vec<WatchGroup>,
    config_path: Option<PathBuf>,
}

impl Pipeline {
    /// Validate `raw` and build a pipeline rooted at `base_dir`.
    ///
    /// Every unresolved task reference (alias members, watch group tasks,
    /// the top-level `default`) is collected into a single
    /// `ConfigValidation` error.
    pub fn load_config(
        raw: RawConfigFile,
        base_dir: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let cfg = ConfigFile::try_from(raw)?;
        Self::from_config(&cfg, base_dir, fs)
    }

    /// Build a pipeline from an already validated configuration.
    pub fn from_config(
        cfg: &ConfigFile,
        base_dir: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let registry = build_registry(cfg)?;

        let groups = cfg
            .watch_groups()
            .iter()
            .map(|(id, group)| WatchGroup::from_config(id, group))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let matcher = FileMatcher::new(base_dir, fs);
        debug!(
            base = ?matcher.base_dir(),
            tasks = registry.len(),
            groups = groups.len(),
            "pipeline built"
        );

        Ok(Self {
            runner: Arc::new(TaskRunner::new(Arc::new(registry), matcher)),
            groups,
            config_path: None,
        })
    }

    /// Load `config_path` from disk. Patterns and paths are relative to the
    /// directory containing the file.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let cfg = load_and_validate(config_path)?;

        let root = config_root_dir(config_path);
        let root = root.canonicalize().unwrap_or(root);
        let config_path = config_path
            .canonicalize()
            .unwrap_or_else(|_| config_path.to_path_buf());

        let mut pipeline = Self::from_config(&cfg, root, Arc::new(RealFileSystem))?;
        pipeline.config_path = Some(config_path);
        Ok(pipeline)
    }

    pub fn registry(&self) -> &TaskRegistry {
        self.runner.registry()
    }

    pub fn runner(&self) -> &Arc<TaskRunner> {
        &self.runner
    }

    pub fn watch_groups(&self) -> &[WatchGroup] {
        &self.groups
    }

    pub fn base_dir(&self) -> &Path {
        self.runner.matcher().base_dir()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub async fn run_task(&self, name: &str) -> Result<RunResult> {
        self.runner.run(name).await
    }

    /// Run the task registered as `default`, or report `skipped` when there
    /// is none.
    pub async fn run_default(&self) -> Result<RunResult> {
        if !self.registry().contains(DEFAULT_TASK) {
            info!("no '{DEFAULT_TASK}' task defined; nothing to run");
            return Ok(RunResult::skipped(DEFAULT_TASK));
        }
        self.runner.run(DEFAULT_TASK).await
    }

    pub fn plan(&self, name: &str) -> Result<Vec<TaskName>> {
        self.runner.plan(name)
    }

    pub fn in_process_backend(&self) -> Arc<dyn RunBackend> {
        Arc::new(InProcessBackend::new(Arc::clone(&self.runner)))
    }

    /// Backend for a spawn policy. `new-process` needs the pipeline to have
    /// been loaded from a file so children can re-read it.
    pub fn backend_for(&self, policy: SpawnPolicy) -> Result<Arc<dyn RunBackend>> {
        match (policy, self.config_path.as_ref()) {
            (SpawnPolicy::InProcess, _) => Ok(self.in_process_backend()),
            (SpawnPolicy::NewProcess, Some(path)) => {
                Ok(Arc::new(SubprocessBackend::current_exe(path.clone())?))
            }
            (SpawnPolicy::NewProcess, None) => {
                warn!("no config file to hand to child processes; running in-process");
                Ok(self.in_process_backend())
            }
        }
    }

    /// Watch every group until `shutdown` fires.
    ///
    /// Runs of all groups share one gate, so they never overlap. In-flight
    /// runs are allowed to finish; pending reruns are dropped. Returns
    /// per-group counters, ordered by group id.
    pub async fn watch(&self, mut shutdown: ShutdownSignal) -> Result<Vec<(String, GroupStats)>> {
        if self.groups.is_empty() {
            warn!("no watch groups configured; waiting for shutdown");
            let _ = shutdown.wait_for(|stop| *stop).await;
            return Ok(Vec::new());
        }

        let gate = RunGate::default();
        let mut routes = Vec::with_capacity(self.groups.len());
        let mut runtimes = Vec::with_capacity(self.groups.len());
        for group in self.groups.iter() {
            let (tx, rx) = mpsc::unbounded_channel();
            routes.push(GroupRoute {
                group: group.id().to_string(),
                files: group.compiled().clone(),
                tx,
            });

            let backend = self.backend_for(group.spawn())?;
            let mut runtime = GroupRuntime::new(group.clone(), backend, rx, shutdown.clone())
                .with_run_gate(Arc::clone(&gate));
            if group.use_hash() {
                runtime = runtime.with_hasher(ContentHasher::new(
                    self.runner.matcher().clone(),
                    group.compiled().clone(),
                ));
            }
            runtimes.push(runtime);
        }

        let _watcher = spawn_watcher(self.base_dir(), routes)?;
        run_groups(runtimes).await
    }
}

/// Drive `runtimes` to completion and collect their counters.
pub async fn run_groups(runtimes: Vec<GroupRuntime>) -> Result<Vec<(String, GroupStats)>> {
    let mut set = JoinSet::new();
    for runtime in runtimes {
        let id = runtime.group().id().to_string();
        set.spawn(async move { (id, runtime.run().await) });
    }

    let mut stats = Vec::new();
    while let Some(joined) = set.join_next().await {
        let (id, result) =
            joined.map_err(|e| anyhow::anyhow!("watch group task panicked: {e}"))?;
        stats.push((id, result?));
    }
    stats.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(stats)
}

/// Register every configured task, plus the implicit `default` alias.
fn build_registry(cfg: &ConfigFile) -> Result<TaskRegistry> {
    let mut registry = TaskRegistry::new();

    for (name, spec) in cfg.tasks().iter() {
        let task = match spec {
            TaskSpec::Alias { members } => Task::alias(name.as_str(), members.iter().cloned()),
            leaf => {
                let action = actions::from_spec(leaf).ok_or_else(|| {
                    BuildflowError::Other(anyhow::anyhow!("task '{name}' has no action"))
                })?;
                Task::leaf_with_options(name.as_str(), action, leaf.options())
            }
        };
        registry.register(task)?;
    }

    if let Some(target) = cfg.default_target() {
        registry.register(Task::alias(DEFAULT_TASK, [target]))?;
    }

    Ok(registry)
}

/// Directory patterns are evaluated against.
///
/// A bare file name like `Buildflow.toml` has an empty parent; that maps to
/// the current working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
