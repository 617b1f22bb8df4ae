//! Weekly report tracker.
//!
//! Remembers whether a report was relayed in the current tracking period.
//! `Pending` until a successful relay, `Satisfied` afterwards, back to
//! `Pending` on the weekly reset. Nothing is persisted; a restart starts the
//! period over as `Pending`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Tracker status for the current period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    Pending,
    Satisfied,
}

/// Snapshot of the tracker fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackerState {
    pub received: bool,
    pub last_received_at: Option<DateTime<Utc>>,
}

impl TrackerState {
    pub fn status(&self) -> TrackerStatus {
        if self.received {
            TrackerStatus::Satisfied
        } else {
            TrackerStatus::Pending
        }
    }
}

/// Shared between the event path and both scheduled jobs; every transition
/// happens under one lock.
#[derive(Debug, Default)]
pub struct WeeklyTracker {
    inner: Mutex<TrackerState>,
}

impl WeeklyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful relay.
    pub fn mark_received(&self, at: DateTime<Utc>) {
        let mut guard = self.inner.lock();
        guard.received = true;
        guard.last_received_at = Some(at);
    }

    /// Start a new tracking period. Safe to call in any state.
    pub fn reset(&self) {
        *self.inner.lock() = TrackerState::default();
    }

    pub fn snapshot(&self) -> TrackerState {
        *self.inner.lock()
    }

    pub fn status(&self) -> TrackerStatus {
        self.snapshot().status()
    }

    pub fn is_satisfied(&self) -> bool {
        self.status() == TrackerStatus::Satisfied
    }
}
