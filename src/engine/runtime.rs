// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, OwnedMutexGuard};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

use crate::errors::Result;
use crate::exec::{RunBackend, RunStatus};
use crate::watch::{ContentHasher, WatchGroup};

use super::core::{GroupCore, GroupStats};
use super::{GroupCommand, GroupEvent, RunGate, ShutdownSignal, Trigger};

/// Stand-in deadline for debounce windows too long to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Drives one watch group.
///
/// This is the IO shell around [`GroupCore`]: it reads changes from the
/// watcher channel, owns the debounce timer, launches runs on the backend
/// and listens for shutdown. All decisions are made by the core.
pub struct GroupRuntime {
    group: WatchGroup,
    core: GroupCore,
    backend: Arc<dyn RunBackend>,
    changes: mpsc::UnboundedReceiver<String>,
    shutdown: ShutdownSignal,
    hasher: Option<ContentHasher>,
    gate: Option<RunGate>,
}

impl fmt::Debug for GroupRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupRuntime")
            .field("group", &self.group)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl GroupRuntime {
    pub fn new(
        group: WatchGroup,
        backend: Arc<dyn RunBackend>,
        changes: mpsc::UnboundedReceiver<String>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let core = GroupCore::new(group.id(), group.debounce());
        Self {
            group,
            core,
            backend,
            changes,
            shutdown,
            hasher: None,
            gate: None,
        }
    }

    /// Gate triggers on content changes (`use_hash`).
    pub fn with_hasher(mut self, hasher: ContentHasher) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Serialize runs with every other group holding the same gate.
    pub fn with_run_gate(mut self, gate: RunGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn group(&self) -> &WatchGroup {
        &self.group
    }

    /// Main loop. Returns once the group has stopped and no run is in flight.
    pub async fn run(mut self) -> Result<GroupStats> {
        info!(
            group = %self.group.id(),
            tasks = ?self.group.bound_tasks(),
            debounce_ms = self.group.debounce().as_millis() as u64,
            "watch group started"
        );

        if let Some(hasher) = self.hasher.as_mut() {
            hasher.prime();
        }

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<RunStatus>();
        let mut deadline: Option<Instant> = None;
        let mut changes_open = true;
        let mut stop_seen = *self.shutdown.borrow();

        if stop_seen {
            self.core.step(GroupEvent::StopRequested);
        }

        loop {
            if self.core.is_stopping() && !self.core.is_running() {
                break;
            }

            let timer = sleep_until(deadline.unwrap_or_else(Instant::now));

            let event = tokio::select! {
                maybe = self.changes.recv(), if changes_open => match maybe {
                    Some(path) => GroupEvent::FileChanged { path },
                    None => {
                        debug!(group = %self.group.id(), "change feed closed");
                        changes_open = false;
                        GroupEvent::StopRequested
                    }
                },
                _ = timer, if deadline.is_some() => {
                    deadline = None;
                    GroupEvent::WindowElapsed {
                        content_changed: self.content_changed(),
                    }
                }
                Some(status) = done_rx.recv() => GroupEvent::RunFinished { status },
                res = self.shutdown.changed(), if !stop_seen => {
                    if res.is_err() || *self.shutdown.borrow() {
                        stop_seen = true;
                        GroupEvent::StopRequested
                    } else {
                        continue;
                    }
                }
            };

            debug!(group = %self.group.id(), ?event, "group received event");
            let step = self.core.step(event);

            for command in step.commands {
                match command {
                    GroupCommand::ArmDebounce(window) => {
                        let now = Instant::now();
                        deadline = Some(now.checked_add(window).unwrap_or(now + FAR_FUTURE));
                    }
                    GroupCommand::CancelDebounce => deadline = None,
                    GroupCommand::StartRun(trigger) => self.start_run(trigger, done_tx.clone()),
                }
            }

            if !step.keep_running {
                break;
            }
        }

        let stats = self.core.stats();
        info!(
            group = %self.group.id(),
            runs = stats.runs_started,
            failed = stats.runs_failed,
            "watch group stopped"
        );
        Ok(stats)
    }

    fn content_changed(&mut self) -> bool {
        match self.hasher.as_mut() {
            Some(hasher) => hasher.changed(),
            None => true,
        }
    }

    fn start_run(&self, trigger: Trigger, done: mpsc::UnboundedSender<RunStatus>) {
        let group = self.group.id().to_string();
        let tasks = self.group.bound_tasks().to_vec();
        let backend = Arc::clone(&self.backend);
        let gate = self.gate.clone();
        let shutdown = self.shutdown.clone();

        info!(
            group = %group,
            changes = trigger.changes(),
            paths = ?trigger.paths(),
            tasks = ?tasks,
            "change detected; running bound tasks"
        );

        tokio::spawn(async move {
            let _turn = match gate {
                Some(gate) => match wait_for_turn(&group, gate, shutdown).await {
                    Some(guard) => Some(guard),
                    None => {
                        info!(group = %group, "stop requested before the run got its turn");
                        let _ = done.send(RunStatus::Skipped);
                        return;
                    }
                },
                None => None,
            };

            let status = match backend.run_tasks(tasks).await {
                Ok(status) => status,
                Err(err) => {
                    error!(group = %group, error = %err, "run could not be started");
                    RunStatus::Failed
                }
            };
            info!(group = %group, status = %status, "bound tasks finished");
            let _ = done.send(status);
        });
    }
}

/// Acquire the run gate, giving up if a stop is requested while waiting.
async fn wait_for_turn(
    group: &str,
    gate: RunGate,
    mut shutdown: ShutdownSignal,
) -> Option<OwnedMutexGuard<()>> {
    if let Ok(guard) = Arc::clone(&gate).try_lock_owned() {
        return Some(guard);
    }

    debug!(group = %group, "another group is running; waiting");
    tokio::select! {
        guard = gate.lock_owned() => Some(guard),
        _ = shutdown.wait_for(|stop| *stop) => None,
    }
}
