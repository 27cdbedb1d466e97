// src/dag/task.rs

//! Task model: alias tasks expand to other tasks, leaf tasks run an action.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::actions::Action;
use crate::types::TaskName;

/// Opaque per-task options. Recognized keys depend on the action kind.
pub type TaskOptions = BTreeMap<String, toml::Value>;

/// What a task does when it is resolved.
#[derive(Clone)]
pub enum TaskKind {
    /// Runs the listed tasks, in order.
    Alias { members: Vec<TaskName> },
    /// Performs a concrete action.
    Leaf {
        action: Arc<dyn Action>,
        options: TaskOptions,
    },
}

impl fmt::Debug for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Alias { members } => {
                f.debug_struct("Alias").field("members", members).finish()
            }
            TaskKind::Leaf { action, options } => f
                .debug_struct("Leaf")
                .field("action", &action.kind())
                .field("options", options)
                .finish(),
        }
    }
}

/// A named task, immutable once registered.
#[derive(Debug, Clone)]
pub struct Task {
    name: TaskName,
    kind: TaskKind,
}

impl Task {
    pub fn alias<N, I, S>(name: N, members: I) -> Self
    where
        N: Into<TaskName>,
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        Self {
            name: name.into(),
            kind: TaskKind::Alias {
                members: members.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn leaf(name: impl Into<TaskName>, action: Arc<dyn Action>) -> Self {
        Self::leaf_with_options(name, action, TaskOptions::new())
    }

    pub fn leaf_with_options(
        name: impl Into<TaskName>,
        action: Arc<dyn Action>,
        options: TaskOptions,
    ) -> Self {
        Self {
            name: name.into(),
            kind: TaskKind::Leaf { action, options },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.kind, TaskKind::Alias { .. })
    }

    /// Alias members; empty for leaf tasks.
    pub fn members(&self) -> &[TaskName] {
        match &self.kind {
            TaskKind::Alias { members } => members,
            TaskKind::Leaf { .. } => &[],
        }
    }

    /// Short label for listings: `alias` or the action kind.
    pub fn kind_label(&self) -> &str {
        match &self.kind {
            TaskKind::Alias { .. } => "alias",
            TaskKind::Leaf { action, .. } => action.kind(),
        }
    }
}
