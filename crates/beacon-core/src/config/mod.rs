//! Per-instance configuration.

pub mod defaults;

use serde::{Deserialize, Serialize};

/// Network classes on which uploads are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    /// 3G, 4G, and Wifi (anything but no connectivity).
    #[default]
    Default,
    /// Wifi only.
    WifiOnly,
    /// Any connectivity, including 2G.
    All,
}

/// Bit set of autotrack event categories, mirroring the original SDK's
/// option mask. Empty by default: autotrack is opt-in per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutotrackEvents(u32);

impl AutotrackEvents {
    pub const NONE: Self = Self(0);
    pub const APP_START: Self = Self(1 << 0);
    pub const APP_END: Self = Self(1 << 1);
    pub const CLICK: Self = Self(1 << 2);
    pub const VIEW_SCREEN: Self = Self(1 << 3);
    pub const CRASH: Self = Self(1 << 4);
    pub const INSTALL: Self = Self(1 << 5);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, category: Self) -> bool {
        self.0 & category.0 == category.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for AutotrackEvents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Instance configuration. All fields have serde defaults so partial
/// configs deserialize cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Network classes on which the flush scheduler may upload.
    pub network_type: NetworkType,
    /// Enabled autotrack categories.
    pub autotrack: AutotrackEvents,
    /// Whether an app start while relaunched in the background is collected.
    pub track_relaunched_in_background: bool,
    /// Seconds between automatic flush attempts.
    pub flush_interval_secs: u64,
    /// Maximum records per upload batch.
    pub flush_batch_size: usize,
    /// Maximum serialized bytes per upload batch.
    pub flush_max_batch_bytes: usize,
    /// Queue entries retained per instance; oldest beyond this are evicted.
    pub queue_capacity: usize,
    /// Queue length that triggers an early flush.
    pub high_water_mark: usize,
    /// First retry delay after a failed upload, in seconds.
    pub backoff_base_secs: u64,
    /// Ceiling for the exponential retry delay, in seconds.
    pub backoff_cap_secs: u64,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            network_type: NetworkType::Default,
            autotrack: AutotrackEvents::NONE,
            track_relaunched_in_background: defaults::TRACK_RELAUNCHED_IN_BACKGROUND,
            flush_interval_secs: crate::constants::DEFAULT_FLUSH_INTERVAL_SECS,
            flush_batch_size: crate::constants::DEFAULT_FLUSH_BATCH_SIZE,
            flush_max_batch_bytes: crate::constants::DEFAULT_MAX_BATCH_BYTES,
            queue_capacity: crate::constants::DEFAULT_QUEUE_CAPACITY,
            high_water_mark: crate::constants::DEFAULT_HIGH_WATER_MARK,
            backoff_base_secs: crate::constants::DEFAULT_BACKOFF_BASE_SECS,
            backoff_cap_secs: crate::constants::DEFAULT_BACKOFF_CAP_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autotrack_mask_combines() {
        let mask = AutotrackEvents::APP_START | AutotrackEvents::CLICK;
        assert!(mask.contains(AutotrackEvents::APP_START));
        assert!(mask.contains(AutotrackEvents::CLICK));
        assert!(!mask.contains(AutotrackEvents::CRASH));
        assert!(AutotrackEvents::NONE.is_empty());
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let cfg: InstanceConfig = serde_json::from_str(r#"{"queue_capacity": 20}"#).unwrap();
        assert_eq!(cfg.queue_capacity, 20);
        assert_eq!(cfg.network_type, NetworkType::Default);
        assert_eq!(
            cfg.flush_interval_secs,
            crate::constants::DEFAULT_FLUSH_INTERVAL_SECS
        );
    }
}
