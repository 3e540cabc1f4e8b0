//! `time_event` support: monotonic timers keyed by event name.

use std::collections::HashMap;
use std::time::Instant;

/// Armed timers. `time_event(name)` starts one; the next track of `name`
/// consumes it and gains a `#duration` property.
#[derive(Debug, Default)]
pub(crate) struct EventTimers {
    started: HashMap<String, Instant>,
}

impl EventTimers {
    /// Arm (or re-arm) the timer for an event name.
    pub fn start(&mut self, name: &str) {
        self.started.insert(name.to_string(), Instant::now());
    }

    /// Consume the timer for `name`, returning elapsed seconds rounded to
    /// millisecond precision.
    pub fn take_duration_secs(&mut self, name: &str) -> Option<f64> {
        self.started
            .remove(name)
            .map(|start| (start.elapsed().as_secs_f64() * 1000.0).round() / 1000.0)
    }
}
