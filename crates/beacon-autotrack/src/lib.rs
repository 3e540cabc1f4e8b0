//! # beacon-autotrack
//!
//! Turns raw lifecycle/UI signals into well-formed event shapes. The actual
//! interception (how a tap or screen transition is observed) lives in the
//! platform layer; this crate is the pure mapping from (signal, config,
//! ignore rules) to an optional synthesized event.

pub mod ignore;
pub mod signal;
pub mod synthesizer;

pub use ignore::IgnoreRules;
pub use signal::Signal;
pub use synthesizer::{synthesize, SynthesizedEvent};
