//! Error taxonomy. Per-subsystem enums aggregated into [`BeaconError`].
//!
//! Nothing in this engine is fatal to the host application: validation
//! failures degrade to dropped properties, collaborator failures degrade to
//! un-augmented events, and transient I/O failures are retried or absorbed.
//! The types here exist so those paths stay distinguishable internally.

mod flush_error;
mod storage_error;

pub use flush_error::FlushError;
pub use storage_error::StorageError;

/// Top-level error for the Beacon engine.
#[derive(Debug, thiserror::Error)]
pub enum BeaconError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Flush(#[from] FlushError),

    #[error("invalid instance id: {0:?}")]
    InvalidInstanceId(String),

    #[error("invalid event name: {0:?}")]
    InvalidEventName(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used across the workspace.
pub type BeaconResult<T> = Result<T, BeaconError>;
