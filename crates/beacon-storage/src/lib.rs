//! # beacon-storage
//!
//! Durable on-device persistence for the Beacon engine: the sequence-ordered
//! event queue and the small key/value store holding per-instance identity,
//! super properties, and consent, all in one SQLite database.

pub mod engine;
pub mod migrations;
pub mod pragmas;
pub mod queries;

pub use engine::StorageEngine;
pub use queries::queue_ops::QueueEntry;

use beacon_core::errors::{BeaconError, StorageError};

/// Map an underlying SQLite failure into the engine error taxonomy.
pub(crate) fn to_storage_err(message: String) -> BeaconError {
    BeaconError::Storage(StorageError::Sqlite { message })
}
