//! # beacon
//!
//! An embeddable client-side telemetry engine. It captures discrete
//! behavioral events, enriches them with identity and contextual properties,
//! persists them durably on-device, and hands batches to an injected
//! uploader under configurable network and consent policies.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use beacon::{InstanceRegistry, InstanceConfig, Properties};
//! use beacon_core::traits::{ConnectivityProbe, NetworkClass, UploadFailure, Uploader};
//! use serde_json::json;
//!
//! struct HttpUploader;
//! impl Uploader for HttpUploader {
//!     fn send(&self, batch: &[beacon::EventRecord]) -> Result<(), UploadFailure> {
//!         // POST the batch to the collection endpoint here.
//!         Ok(())
//!     }
//! }
//!
//! struct AlwaysWifi;
//! impl ConnectivityProbe for AlwaysWifi {
//!     fn network_class(&self) -> NetworkClass {
//!         NetworkClass::Wifi
//!     }
//! }
//!
//! fn main() -> beacon::BeaconResult<()> {
//!     let registry = InstanceRegistry::open("/var/data/beacon.db".as_ref())?;
//!     let instance = registry.get_or_create(
//!         "my_app",
//!         InstanceConfig::default(),
//!         Arc::new(HttpUploader),
//!         Arc::new(AlwaysWifi),
//!     )?;
//!
//!     let mut props = Properties::new();
//!     props.insert("amount".into(), json!(9.99));
//!     instance.track_with_properties("purchase", props)?;
//!     instance.flush()?;
//!     Ok(())
//! }
//! ```

mod composer;
mod identity;
mod instance;
mod registry;
mod timing;

pub use instance::Instance;
pub use registry::InstanceRegistry;

// Re-export the types callers interact with.
pub use beacon_autotrack::{IgnoreRules, Signal};
pub use beacon_core::config::{AutotrackEvents, InstanceConfig, NetworkType};
pub use beacon_core::consent::ConsentState;
pub use beacon_core::errors::{BeaconError, BeaconResult};
pub use beacon_core::event::{EventKind, EventRecord, Properties};
pub use beacon_core::traits::{
    ConnectivityProbe, DynamicSuperProperties, NetworkClass, ScreenPropertyProvider,
    UploadFailure, Uploader,
};
