//! Config defaults that are not shared engine constants.

/// Background-relaunch app starts are not collected unless opted in,
/// matching the original config flag's default.
pub const TRACK_RELAUNCHED_IN_BACKGROUND: bool = false;
