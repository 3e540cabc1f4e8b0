//! Schema migrations, versioned through `PRAGMA user_version`.

mod v001_initial;

use rusqlite::Connection;

use beacon_core::errors::{BeaconError, BeaconResult, StorageError};

use crate::to_storage_err;

const CURRENT_VERSION: u32 = 1;

/// Run all pending migrations on the given connection.
pub fn run_migrations(conn: &Connection) -> BeaconResult<()> {
    let version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;

    if version < 1 {
        v001_initial::migrate(conn).map_err(|e| {
            BeaconError::Storage(StorageError::MigrationFailed {
                version: 1,
                reason: e.to_string(),
            })
        })?;
    }

    if version < CURRENT_VERSION {
        conn.pragma_update(None, "user_version", CURRENT_VERSION)
            .map_err(|e| to_storage_err(e.to_string()))?;
    }
    Ok(())
}
