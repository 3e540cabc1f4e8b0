//! Exponential retry backoff for failed uploads.

use std::time::{Duration, Instant};

/// Doubles the delay on each consecutive failure, up to a cap. Gates only
/// automatic flush attempts; a manual `flush()` resets and retries at once.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    consecutive_failures: u32,
    due_at: Option<Instant>,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            consecutive_failures: 0,
            due_at: None,
        }
    }

    /// Record a failed attempt and arm the next delay.
    pub fn record_failure(&mut self) {
        let exp = self.consecutive_failures.min(16);
        let delay = self
            .base
            .checked_mul(1u32 << exp)
            .map(|d| d.min(self.cap))
            .unwrap_or(self.cap);
        self.due_at = Some(Instant::now() + delay);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Clear the failure streak after a success or a manual flush.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.due_at = None;
    }

    /// Whether an automatic attempt is permitted now.
    pub fn is_due(&self) -> bool {
        self.due_at.map_or(true, |t| Instant::now() >= t)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// The delay that would be armed by the next failure. Exposed for tests.
    pub fn next_delay(&self) -> Duration {
        let exp = self.consecutive_failures.min(16);
        self.base
            .checked_mul(1u32 << exp)
            .map(|d| d.min(self.cap))
            .unwrap_or(self.cap)
    }
}
