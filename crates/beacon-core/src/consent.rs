//! Consent state machine.
//!
//! Transitions are one-directional except `Paused <-> Tracking`. The two
//! opted-out states can only be exited through an explicit opt-in, which
//! resets to `Tracking` but never restores purged data. Invalid transitions
//! are no-ops.

use serde::{Deserialize, Serialize};

/// Per-instance consent state gating enqueue and flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentState {
    /// Normal operation.
    #[default]
    Tracking,
    /// User-disabled, resumable; no enqueue, queue retained.
    Paused,
    /// Opted out; no enqueue, queue purged, no deletion event emitted.
    OptedOut,
    /// Opted out with a terminal `user_delete` emitted once before purge.
    OptedOutDeleted,
}

impl ConsentState {
    /// Whether new records may be appended to the queue.
    pub fn allows_enqueue(self) -> bool {
        self == ConsentState::Tracking
    }

    /// Whether the flush scheduler may transmit queued records.
    /// `OptedOutDeleted` still flushes so the pending `user_delete` drains.
    pub fn allows_flush(self) -> bool {
        matches!(self, ConsentState::Tracking | ConsentState::OptedOutDeleted)
    }

    /// `enable_tracking(true)` resumes from `Paused`; `(false)` pauses from
    /// `Tracking`. No-op in the opted-out states.
    pub fn with_tracking_enabled(self, enabled: bool) -> Self {
        match (self, enabled) {
            (ConsentState::Tracking, false) => ConsentState::Paused,
            (ConsentState::Paused, true) => ConsentState::Tracking,
            (state, _) => state,
        }
    }

    /// `opt_out_tracking`: any state except `OptedOutDeleted` moves to
    /// `OptedOut`. The caller purges the queue on an actual transition.
    pub fn opted_out(self) -> Self {
        match self {
            ConsentState::OptedOutDeleted => ConsentState::OptedOutDeleted,
            _ => ConsentState::OptedOut,
        }
    }

    /// `opt_in_tracking`: resets either opted-out state to `Tracking`.
    /// No-op for `Tracking` and `Paused`.
    pub fn opted_in(self) -> Self {
        match self {
            ConsentState::OptedOut | ConsentState::OptedOutDeleted => ConsentState::Tracking,
            state => state,
        }
    }
}
