// src/watch/group.rs

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::WatchGroupConfig;
use crate::fs::{CompiledFileSet, FileSet};
use crate::types::{SpawnPolicy, TaskName};

/// A set of watched files bound to an ordered list of tasks.
///
/// Built once at load time and not mutated afterwards; the per-group runtime
/// state lives in `engine::GroupCore`.
#[derive(Clone)]
pub struct WatchGroup {
    id: String,
    file_set: FileSet,
    compiled: CompiledFileSet,
    bound_tasks: Vec<TaskName>,
    debounce: Duration,
    spawn: SpawnPolicy,
    use_hash: bool,
}

impl fmt::Debug for WatchGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGroup")
            .field("id", &self.id)
            .field("patterns", &self.file_set.patterns())
            .field("bound_tasks", &self.bound_tasks)
            .field("debounce", &self.debounce)
            .field("spawn", &self.spawn)
            .field("use_hash", &self.use_hash)
            .finish()
    }
}

impl WatchGroup {
    pub fn new(
        id: impl Into<String>,
        file_set: FileSet,
        bound_tasks: Vec<TaskName>,
        debounce: Duration,
    ) -> Result<Self> {
        let id = id.into();
        let compiled = file_set
            .compile()
            .with_context(|| format!("compiling patterns for watch group '{id}'"))?;
        Ok(Self {
            id,
            file_set,
            compiled,
            bound_tasks,
            debounce,
            spawn: SpawnPolicy::default(),
            use_hash: false,
        })
    }

    pub fn from_config(id: &str, cfg: &WatchGroupConfig) -> Result<Self> {
        Ok(Self::new(
            id,
            FileSet::new(cfg.files.iter().cloned()),
            cfg.tasks.clone(),
            cfg.debounce,
        )?
        .with_spawn(cfg.spawn)
        .with_use_hash(cfg.use_hash))
    }

    pub fn with_spawn(mut self, spawn: SpawnPolicy) -> Self {
        self.spawn = spawn;
        self
    }

    pub fn with_use_hash(mut self, use_hash: bool) -> Self {
        self.use_hash = use_hash;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_set(&self) -> &FileSet {
        &self.file_set
    }

    pub fn compiled(&self) -> &CompiledFileSet {
        &self.compiled
    }

    pub fn bound_tasks(&self) -> &[TaskName] {
        &self.bound_tasks
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn spawn(&self) -> SpawnPolicy {
        self.spawn
    }

    pub fn use_hash(&self) -> bool {
        self.use_hash
    }

    /// Whether a change to `rel_path` (relative to the config dir) concerns
    /// this group.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.compiled.matches(rel_path)
    }
}
