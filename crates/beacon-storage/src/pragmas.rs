//! PRAGMA configuration applied to every SQLite connection.
//!
//! WAL mode with synchronous FULL: an enqueue that has returned must survive
//! an immediate crash, so commits are fsynced. busy_timeout covers the host
//! app opening the same database from another process.

use rusqlite::Connection;

use beacon_core::errors::BeaconResult;

use crate::to_storage_err;

/// Apply safety pragmas to a connection.
pub fn apply_pragmas(conn: &Connection) -> BeaconResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = FULL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
