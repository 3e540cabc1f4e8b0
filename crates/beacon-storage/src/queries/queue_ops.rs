//! Durable event queue operations: append, ordered peek, acknowledged
//! removal, purge, and capacity eviction.
//!
//! `seq` is a global AUTOINCREMENT rowid; restricting it to one instance
//! yields that instance's strictly increasing enqueue order, which is the
//! transmission order contract.

use rusqlite::{params, Connection};

use beacon_core::errors::{BeaconResult, StorageError};
use beacon_core::event::EventRecord;

use crate::to_storage_err;

/// A persisted, sequence-numbered wrapper around an [`EventRecord`].
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub seq: i64,
    pub instance_id: String,
    pub record: EventRecord,
}

/// Append a record and evict the oldest rows beyond `capacity`, in one
/// transaction. The commit is the durability point: once this returns, a
/// crash does not lose the record.
pub fn enqueue(
    conn: &Connection,
    instance_id: &str,
    record: &EventRecord,
    capacity: usize,
) -> BeaconResult<QueueEntry> {
    let payload = serde_json::to_string(record)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("enqueue begin: {e}")))?;

    tx.execute(
        "INSERT INTO event_queue (instance_id, payload) VALUES (?1, ?2)",
        params![instance_id, payload],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    let seq = tx.last_insert_rowid();

    // Lossy-under-pressure policy: keep the newest `capacity` entries.
    let evicted = tx
        .execute(
            "DELETE FROM event_queue
             WHERE instance_id = ?1
               AND seq NOT IN (
                   SELECT seq FROM event_queue
                   WHERE instance_id = ?1
                   ORDER BY seq DESC
                   LIMIT ?2
               )",
            params![instance_id, capacity as i64],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    tx.commit()
        .map_err(|e| to_storage_err(format!("enqueue commit: {e}")))?;

    if evicted > 0 {
        tracing::warn!(
            instance_id = %instance_id,
            evicted,
            "queue over capacity, evicted oldest entries"
        );
    }

    Ok(QueueEntry {
        seq,
        instance_id: instance_id.to_string(),
        record: record.clone(),
    })
}

/// Return up to `max_count` entries (and at most `max_bytes` of payload) in
/// sequence order. The first entry is always returned even if it alone
/// exceeds `max_bytes`, so an oversized record cannot wedge the queue.
/// An undecodable row is logged and removed so the healthy records behind
/// it stay reachable; it can never be transmitted anyway.
pub fn peek_batch(
    conn: &Connection,
    instance_id: &str,
    max_count: usize,
    max_bytes: usize,
) -> BeaconResult<Vec<QueueEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT seq, payload FROM event_queue
             WHERE instance_id = ?1
             ORDER BY seq ASC
             LIMIT ?2",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![instance_id, max_count as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut entries = Vec::new();
    let mut undecodable = Vec::new();
    let mut bytes = 0usize;
    for row in rows {
        let (seq, payload) = row.map_err(|e| to_storage_err(e.to_string()))?;
        if !entries.is_empty() && bytes + payload.len() > max_bytes {
            break;
        }
        let record: EventRecord = match serde_json::from_str(&payload) {
            Ok(record) => record,
            Err(e) => {
                let err = StorageError::UndecodableEntry {
                    instance_id: instance_id.to_string(),
                    seq,
                    reason: e.to_string(),
                };
                tracing::warn!(error = %err, "dropping undecodable queue entry");
                undecodable.push(seq);
                continue;
            }
        };
        bytes += payload.len();
        entries.push(QueueEntry {
            seq,
            instance_id: instance_id.to_string(),
            record,
        });
    }
    drop(stmt);

    for seq in undecodable {
        conn.execute(
            "DELETE FROM event_queue WHERE instance_id = ?1 AND seq = ?2",
            params![instance_id, seq],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    }
    Ok(entries)
}

/// Remove exactly the given sequence numbers. Idempotent: acknowledging the
/// same batch twice removes nothing the second time. Returns the number of
/// rows actually removed.
pub fn acknowledge(conn: &Connection, instance_id: &str, seqs: &[i64]) -> BeaconResult<usize> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("acknowledge begin: {e}")))?;

    let mut removed = 0usize;
    {
        let mut stmt = tx
            .prepare("DELETE FROM event_queue WHERE instance_id = ?1 AND seq = ?2")
            .map_err(|e| to_storage_err(e.to_string()))?;
        for seq in seqs {
            removed += stmt
                .execute(params![instance_id, seq])
                .map_err(|e| to_storage_err(e.to_string()))?;
        }
    }

    tx.commit()
        .map_err(|e| to_storage_err(format!("acknowledge commit: {e}")))?;
    Ok(removed)
}

/// Remove all entries for the instance. Used by the opt-out transitions.
pub fn purge(conn: &Connection, instance_id: &str) -> BeaconResult<usize> {
    conn.execute(
        "DELETE FROM event_queue WHERE instance_id = ?1",
        params![instance_id],
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Remove all entries for the instance except `keep_seq`. Used by
/// opt-out-and-delete, which must leave exactly the terminal `user_delete`.
pub fn purge_except(conn: &Connection, instance_id: &str, keep_seq: i64) -> BeaconResult<usize> {
    conn.execute(
        "DELETE FROM event_queue WHERE instance_id = ?1 AND seq != ?2",
        params![instance_id, keep_seq],
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Current queue length for the instance.
pub fn queue_len(conn: &Connection, instance_id: &str) -> BeaconResult<usize> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM event_queue WHERE instance_id = ?1",
            params![instance_id],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(count as usize)
}
