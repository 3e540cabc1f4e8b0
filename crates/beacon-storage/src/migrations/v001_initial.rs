//! v001: event_queue, instance_state, device.

use rusqlite::Connection;

use beacon_core::errors::BeaconResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> BeaconResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS event_queue (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            instance_id TEXT NOT NULL,
            payload     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_queue_instance ON event_queue(instance_id, seq);

        CREATE TABLE IF NOT EXISTS instance_state (
            instance_id TEXT NOT NULL,
            key         TEXT NOT NULL,
            value       TEXT NOT NULL,
            PRIMARY KEY (instance_id, key)
        );

        CREATE TABLE IF NOT EXISTS device (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
