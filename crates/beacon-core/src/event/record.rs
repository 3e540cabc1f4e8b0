//! EventRecord: one fully composed, self-contained unit of telemetry.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use super::properties::{self, Properties};

/// The kind of an event record. Autotrack kinds are synthesized from raw
/// lifecycle/UI signals; the rest come from explicit API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Track,
    UserSet,
    UserUnset,
    UserSetOnce,
    UserAdd,
    UserDelete,
    AutotrackAppStart,
    AutotrackAppEnd,
    AutotrackClick,
    AutotrackViewScreen,
    AutotrackInstall,
    AutotrackCrash,
}

impl EventKind {
    /// Whether this kind carries an event name. `Track` and every autotrack
    /// kind do; user-property kinds do not.
    pub fn requires_name(self) -> bool {
        !matches!(
            self,
            EventKind::UserSet
                | EventKind::UserUnset
                | EventKind::UserSetOnce
                | EventKind::UserAdd
                | EventKind::UserDelete
        )
    }

    /// Whether super properties (static and dynamic) are merged into records
    /// of this kind. Only `Track` and autotrack kinds receive them.
    pub fn merges_super_properties(self) -> bool {
        self.requires_name()
    }
}

/// One unit to be transmitted. Every persisted record is fully composed:
/// identity and property changes after enqueue never alter it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    /// Required for `Track` and autotrack kinds, absent otherwise.
    pub name: Option<String>,
    pub properties: Properties,
    /// Event time in UTC.
    pub time: DateTime<Utc>,
    /// Offset of the event's local timezone from UTC, in minutes.
    pub zone_offset_minutes: i32,
    pub distinct_id: String,
    pub account_id: Option<String>,
    pub device_id: String,
    pub instance_id: String,
}

impl EventRecord {
    /// The event time rendered on the wall clock it was captured under,
    /// in the format the collection endpoint expects.
    pub fn local_time_string(&self) -> String {
        let offset = FixedOffset::east_opt(self.zone_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());
        properties::format_time(&self.time.with_timezone(&offset))
    }
}
