//! # beacon-core
//!
//! Foundation crate for the Beacon telemetry engine.
//! Defines all types, traits, errors, config, and constants.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod consent;
pub mod constants;
pub mod errors;
pub mod event;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::{AutotrackEvents, InstanceConfig, NetworkType};
pub use consent::ConsentState;
pub use errors::{BeaconError, BeaconResult};
pub use event::{EventKind, EventRecord, Properties};
pub use traits::{ConnectivityProbe, DynamicSuperProperties, NetworkClass, Uploader};
