// src/engine/mod.rs

//! Per-watch-group orchestration.
//!
//! Every watch group is driven by its own small state machine:
//! - a debounce window that coalesces bursts of file changes into one trigger
//! - a running flag, so at most one run per group is in flight
//! - a single pending slot for the rerun requested while a run was active
//!
//! Groups wait on a shared [`RunGate`] before running, so runs of different
//! groups are serialized too.
//!
//! The pure state machine lives in [`core`]; the async/IO shell that owns the
//! timer, the change channel and the run backend is [`runtime`].

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::exec::RunStatus;

pub mod core;
pub mod pending;
pub mod runtime;

pub use self::core::{GroupCommand, GroupCore, GroupStats, GroupStep};
pub use pending::PendingSlot;
pub use runtime::GroupRuntime;

/// Receiving end of the shutdown flag shared by all groups.
///
/// Flipping the sender to `true` (or dropping it) asks every group to stop.
pub type ShutdownSignal = tokio::sync::watch::Receiver<bool>;

/// Lock held for the duration of a run.
///
/// All groups of one `watch` share a gate, so at most one run is active at a
/// time even when several groups fire together.
pub type RunGate = Arc<tokio::sync::Mutex<()>>;

/// A coalesced batch of changes that fires one run of the bound tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    changes: usize,
    paths: BTreeSet<String>,
}

impl Trigger {
    /// Start a trigger from the first change of a debounce window.
    pub fn new(path: impl Into<String>) -> Self {
        let mut paths = BTreeSet::new();
        paths.insert(path.into());
        Self { changes: 1, paths }
    }

    /// Fold another change into this trigger.
    pub fn record(&mut self, path: impl Into<String>) {
        self.changes += 1;
        self.paths.insert(path.into());
    }

    /// Number of change notifications coalesced, duplicates included.
    pub fn changes(&self) -> usize {
        self.changes
    }

    /// Distinct relative paths that changed.
    pub fn paths(&self) -> &BTreeSet<String> {
        &self.paths
    }
}

/// Events flowing into a group's state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupEvent {
    /// A path matching the group's file set changed.
    FileChanged { path: String },
    /// The debounce window closed. `content_changed` is false when
    /// `use_hash` found the watched contents identical to the last run.
    WindowElapsed { content_changed: bool },
    /// The in-flight run ended.
    RunFinished { status: RunStatus },
    /// Graceful stop requested (signal, or the change feed closed).
    StopRequested,
}
