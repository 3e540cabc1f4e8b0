//! Engine-wide constants and defaults.

/// Seconds between automatic flush attempts.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 15;

/// Maximum number of records handed to the uploader per batch.
pub const DEFAULT_FLUSH_BATCH_SIZE: usize = 50;

/// Maximum serialized payload bytes per batch.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 1024 * 1024;

/// Queue entries retained per instance before the oldest are evicted.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Queue length that triggers an early flush.
pub const DEFAULT_HIGH_WATER_MARK: usize = 100;

/// First retry delay after a failed upload.
pub const DEFAULT_BACKOFF_BASE_SECS: u64 = 2;

/// Ceiling for the exponential retry delay.
pub const DEFAULT_BACKOFF_CAP_SECS: u64 = 600;

/// Property key carrying the elapsed seconds recorded by `time_event`.
pub const DURATION_KEY: &str = "#duration";

/// Pattern every property key and event name must match.
pub const KEY_PATTERN: &str = "^[a-zA-Z][a-zA-Z0-9_]{0,49}$";

/// Preset event names for synthesized autotrack events.
pub mod autotrack_events {
    pub const APP_START: &str = "ta_app_start";
    pub const APP_END: &str = "ta_app_end";
    pub const APP_CLICK: &str = "ta_app_click";
    pub const APP_VIEW: &str = "ta_app_view";
    pub const APP_INSTALL: &str = "ta_app_install";
    pub const APP_CRASH: &str = "ta_app_crash";
}

/// Preset property keys attached by the autotrack synthesizer.
pub mod preset_keys {
    pub const ELEMENT_ID: &str = "#element_id";
    pub const ELEMENT_TYPE: &str = "#element_type";
    pub const ELEMENT_CONTENT: &str = "#element_content";
    pub const SCREEN_NAME: &str = "#screen_name";
    pub const TITLE: &str = "#title";
    pub const URL: &str = "#url";
    pub const CRASH_REASON: &str = "#app_crashed_reason";
    pub const RESUME_FROM_BACKGROUND: &str = "#resume_from_background";
}
