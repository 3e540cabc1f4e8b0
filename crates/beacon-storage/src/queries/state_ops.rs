//! Persisted per-instance state (identity, super properties, consent) and
//! the device-wide id.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use beacon_core::errors::BeaconResult;

use crate::to_storage_err;

/// Read one persisted state value for an instance.
pub fn get_state(conn: &Connection, instance_id: &str, key: &str) -> BeaconResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM instance_state WHERE instance_id = ?1 AND key = ?2",
        params![instance_id, key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Write (upsert) one persisted state value for an instance.
pub fn set_state(conn: &Connection, instance_id: &str, key: &str, value: &str) -> BeaconResult<()> {
    conn.execute(
        "INSERT INTO instance_state (instance_id, key, value) VALUES (?1, ?2, ?3)
         ON CONFLICT (instance_id, key) DO UPDATE SET value = excluded.value",
        params![instance_id, key, value],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Write a state value only if the key is absent. Returns whether this call
/// inserted it; concurrent callers racing on the same key see exactly one
/// `true`.
pub fn set_state_if_absent(
    conn: &Connection,
    instance_id: &str,
    key: &str,
    value: &str,
) -> BeaconResult<bool> {
    let inserted = conn
        .execute(
            "INSERT INTO instance_state (instance_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (instance_id, key) DO NOTHING",
            params![instance_id, key, value],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(inserted > 0)
}

/// Remove one persisted state value for an instance.
pub fn delete_state(conn: &Connection, instance_id: &str, key: &str) -> BeaconResult<()> {
    conn.execute(
        "DELETE FROM instance_state WHERE instance_id = ?1 AND key = ?2",
        params![instance_id, key],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Return the persisted device id, creating it on first use. The id is
/// shared by every instance on the device and survives restarts.
pub fn get_or_create_device_id(conn: &Connection) -> BeaconResult<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT value FROM device WHERE key = 'device_id'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = Uuid::new_v4().to_string();
    // INSERT OR IGNORE + re-read keeps this correct if another process
    // creates the id between our read and write.
    conn.execute(
        "INSERT OR IGNORE INTO device (key, value) VALUES ('device_id', ?1)",
        params![id],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    conn.query_row(
        "SELECT value FROM device WHERE key = 'device_id'",
        [],
        |row| row.get(0),
    )
    .map_err(|e| to_storage_err(e.to_string()))
}
