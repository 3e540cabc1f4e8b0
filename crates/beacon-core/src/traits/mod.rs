//! Collaborator seams consumed by the engine. The host application (or the
//! platform layer) supplies implementations; the engine never owns a network
//! stack or a UI hook of its own.

mod connectivity;
mod properties;
mod uploader;

pub use connectivity::{ConnectivityProbe, NetworkClass};
pub use properties::{DynamicSuperProperties, ScreenPropertyProvider};
pub use uploader::{UploadFailure, Uploader};
