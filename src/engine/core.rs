// src/engine/core.rs

//! Pure per-group state machine.
//!
//! [`GroupCore`] consumes [`GroupEvent`]s and produces:
//! - an updated state (window, running flag, pending slot)
//! - a list of [`GroupCommand`]s describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::GroupRuntime`) owns the timer, the
//! change channel and the run backend. The core has no Tokio types and does
//! no IO, so the debounce and serialization rules are unit tested here
//! without clocks or processes.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::pending::PendingSlot;
use super::{GroupEvent, Trigger};
use crate::exec::RunStatus;

/// What the IO shell should do after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCommand {
    /// Start the debounce timer; fire `WindowElapsed` after the duration.
    ArmDebounce(Duration),
    /// Forget the armed timer.
    CancelDebounce,
    /// Run the bound tasks for this trigger.
    StartRun(Trigger),
}

/// Result of one step of the core.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GroupStep {
    pub commands: Vec<GroupCommand>,
    /// False once the group has stopped and nothing is in flight.
    pub keep_running: bool,
}

/// Counters kept for the lifetime of a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupStats {
    pub runs_started: u64,
    pub runs_failed: u64,
    /// Pending reruns replaced by a newer trigger.
    pub triggers_superseded: u64,
    /// Triggers dropped because `use_hash` saw no content change.
    pub triggers_unchanged: u64,
    /// Pending reruns dropped by a stop request.
    pub reruns_dropped: u64,
}

#[derive(Debug)]
pub struct GroupCore {
    id: String,
    debounce: Duration,
    window: Option<Trigger>,
    running: bool,
    pending: PendingSlot,
    stopping: bool,
    stats: GroupStats,
}

impl GroupCore {
    pub fn new(id: impl Into<String>, debounce: Duration) -> Self {
        Self {
            id: id.into(),
            debounce,
            window: None,
            running: false,
            pending: PendingSlot::new(),
            stopping: false,
            stats: GroupStats::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn window_open(&self) -> bool {
        self.window.is_some()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    pub fn stats(&self) -> GroupStats {
        GroupStats {
            triggers_superseded: self.pending.superseded(),
            ..self.stats
        }
    }

    /// Handle a single event, returning the commands for the IO shell.
    pub fn step(&mut self, event: GroupEvent) -> GroupStep {
        let commands = match event {
            GroupEvent::FileChanged { path } => self.on_file_changed(path),
            GroupEvent::WindowElapsed { content_changed } => {
                self.on_window_elapsed(content_changed)
            }
            GroupEvent::RunFinished { status } => self.on_run_finished(status),
            GroupEvent::StopRequested => self.on_stop(),
        };

        GroupStep {
            commands,
            keep_running: !(self.stopping && !self.running),
        }
    }

    fn on_file_changed(&mut self, path: String) -> Vec<GroupCommand> {
        if self.stopping {
            return Vec::new();
        }

        match self.window.as_mut() {
            Some(window) => {
                window.record(path);
                Vec::new()
            }
            None => {
                debug!(group = %self.id, path = %path, "opening debounce window");
                self.window = Some(Trigger::new(path));
                vec![GroupCommand::ArmDebounce(self.debounce)]
            }
        }
    }

    fn on_window_elapsed(&mut self, content_changed: bool) -> Vec<GroupCommand> {
        let Some(trigger) = self.window.take() else {
            return Vec::new();
        };
        if self.stopping {
            return Vec::new();
        }

        if !content_changed {
            self.stats.triggers_unchanged += 1;
            info!(
                group = %self.id,
                changes = trigger.changes(),
                "watched contents unchanged; skipping trigger"
            );
            return Vec::new();
        }

        if self.running {
            debug!(
                group = %self.id,
                changes = trigger.changes(),
                "run in flight; keeping trigger pending"
            );
            self.pending.offer(trigger);
            return Vec::new();
        }

        vec![self.start(trigger)]
    }

    fn on_run_finished(&mut self, status: RunStatus) -> Vec<GroupCommand> {
        self.running = false;
        if status == RunStatus::Failed {
            self.stats.runs_failed += 1;
            warn!(group = %self.id, "run failed; still watching");
        }

        if self.stopping {
            return Vec::new();
        }

        match self.pending.take() {
            Some(trigger) => vec![self.start(trigger)],
            None => Vec::new(),
        }
    }

    fn on_stop(&mut self) -> Vec<GroupCommand> {
        if self.stopping {
            return Vec::new();
        }
        self.stopping = true;

        if self.pending.clear() {
            self.stats.reruns_dropped += 1;
            info!(group = %self.id, "stop requested; dropping pending rerun");
        }

        let mut commands = Vec::new();
        if self.window.take().is_some() {
            commands.push(GroupCommand::CancelDebounce);
        }
        commands
    }

    fn start(&mut self, trigger: Trigger) -> GroupCommand {
        self.running = true;
        self.stats.runs_started += 1;
        GroupCommand::StartRun(trigger)
    }
}
