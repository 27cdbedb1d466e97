// src/dag/registry.rs

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::dag::task::{Task, TaskKind};
use crate::errors::{BuildflowError, Result};
use crate::types::TaskName;

/// Registry of named tasks.
///
/// Built once at configuration-load time and then shared read-only (behind an
/// `Arc`) by the runner and the watcher.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskName, Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Fails if a task with the same name already exists.
    pub fn register(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(task.name()) {
            return Err(BuildflowError::DuplicateTask(task.name().to_string()));
        }
        debug!(task = %task.name(), kind = %task.kind_label(), "registered task");
        self.tasks.insert(task.name().to_string(), task);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Task names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Flatten `name` into the ordered list of leaf tasks it runs.
    ///
    /// Aliases expand depth-first, left to right. A leaf reachable through
    /// several paths appears once, at its first position.
    ///
    /// Errors:
    /// - `UnknownTask` if `name` (or any member) is not registered.
    /// - `CyclicTask` if expansion re-enters a task already being expanded.
    pub fn resolve(&self, name: &str) -> Result<Vec<&Task>> {
        let mut stack = Vec::new();
        let mut done = HashSet::new();
        let mut leaves = Vec::new();
        self.expand(name, &mut stack, &mut done, &mut leaves)?;
        Ok(leaves)
    }

    fn expand<'a>(
        &'a self,
        name: &str,
        stack: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
        leaves: &mut Vec<&'a Task>,
    ) -> Result<()> {
        let (key, task) = self
            .tasks
            .get_key_value(name)
            .ok_or_else(|| BuildflowError::UnknownTask(name.to_string()))?;
        let key = key.as_str();

        if let Some(pos) = stack.iter().position(|n| *n == key) {
            let mut cycle: Vec<TaskName> = stack[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(key.to_string());
            return Err(BuildflowError::CyclicTask { cycle });
        }

        // Leaves already emitted, or aliases whose leaves all are.
        if done.contains(key) {
            return Ok(());
        }

        match task.kind() {
            TaskKind::Leaf { .. } => leaves.push(task),
            TaskKind::Alias { members } => {
                stack.push(key);
                for member in members {
                    self.expand(member, stack, done, leaves)?;
                }
                stack.pop();
            }
        }

        done.insert(key);
        Ok(())
    }
}
