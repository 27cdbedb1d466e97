// src/engine/pending.rs

use tracing::debug;

use super::Trigger;

/// Single-slot holder for a trigger that arrived while a run was in flight.
///
/// At most one rerun is remembered per group. A newer trigger replaces the
/// one already waiting instead of queueing behind it, so a burst of edits
/// during a long build produces exactly one follow-up run.
#[derive(Debug, Default)]
pub struct PendingSlot {
    trigger: Option<Trigger>,
    superseded: u64,
}

impl PendingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.trigger.is_none()
    }

    /// Store `trigger`, replacing any trigger already waiting.
    pub fn offer(&mut self, trigger: Trigger) {
        if let Some(old) = self.trigger.replace(trigger) {
            self.superseded += 1;
            debug!(
                dropped_changes = old.changes(),
                superseded = self.superseded,
                "pending trigger superseded"
            );
        }
    }

    /// Take the waiting trigger, leaving the slot empty.
    pub fn take(&mut self) -> Option<Trigger> {
        self.trigger.take()
    }

    /// Drop the waiting trigger, if any. Returns whether one was dropped.
    pub fn clear(&mut self) -> bool {
        self.trigger.take().is_some()
    }

    /// How many waiting triggers were replaced by newer ones.
    pub fn superseded(&self) -> u64 {
        self.superseded
    }
}
