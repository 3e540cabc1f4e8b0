//! Property maps: validation, precedence merging, time formatting.
//!
//! Validation drops individual offenders and keeps going; a bad property
//! never aborts the event that carries it.

use std::sync::OnceLock;

use chrono::{DateTime, TimeZone};
use regex::Regex;
use serde_json::{Map, Value};

use crate::constants::KEY_PATTERN;

/// A property mapping: key to scalar, array, or nested mapping.
pub type Properties = Map<String, Value>;

fn key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(KEY_PATTERN).expect("key pattern is a valid regex"))
}

/// Check a user-supplied property key: starts with a letter, then letters,
/// digits, or underscores, at most 50 chars. Preset `#`-prefixed keys are
/// stamped by the engine after validation and never pass through here.
pub fn is_valid_key(key: &str) -> bool {
    key_regex().is_match(key)
}

/// Event names follow the same rule as property keys.
pub fn is_valid_event_name(name: &str) -> bool {
    is_valid_key(name)
}

/// Check a property value: strings, booleans, finite numbers, arrays of
/// valid values, and nested mappings of valid values. `Null` and non-finite
/// floats are rejected.
pub fn is_valid_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(_) | Value::String(_) => true,
        Value::Number(n) => n.as_f64().is_some_and(f64::is_finite),
        Value::Array(items) => items.iter().all(is_valid_value),
        Value::Object(map) => map.values().all(is_valid_value),
    }
}

/// Drop invalid entries from a property map, logging each one.
/// Returns the surviving entries.
pub fn sanitize(props: Properties) -> Properties {
    let mut out = Properties::new();
    for (key, value) in props {
        if !is_valid_key(&key) {
            tracing::warn!(key = %key, "dropping property with invalid key");
            continue;
        }
        if !is_valid_value(&value) {
            tracing::warn!(key = %key, "dropping property with invalid value");
            continue;
        }
        out.insert(key, value);
    }
    out
}

/// Merge property sources with later sources winning on key collision.
/// Callers pass `[static, dynamic, call-site]` so call-site beats dynamic
/// beats static.
pub fn merge<I>(sources: I) -> Properties
where
    I: IntoIterator<Item = Properties>,
{
    let mut out = Properties::new();
    for source in sources {
        for (key, value) in source {
            out.insert(key, value);
        }
    }
    out
}

/// Format a time-typed property value the way the collection endpoint
/// expects: local wall-clock with millisecond precision.
pub fn format_time<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}
