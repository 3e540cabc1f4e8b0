//! StorageEngine: owns the single write connection, runs migrations on open,
//! and exposes the queue and state access patterns the core requires.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use beacon_core::errors::BeaconResult;
use beacon_core::event::EventRecord;

use crate::queries::{queue_ops, state_ops};
use crate::queries::queue_ops::QueueEntry;
use crate::{migrations, pragmas, to_storage_err};

/// The durable store shared by every instance in the process. One SQLite
/// connection behind a mutex: SQLite itself is the serialization point, and
/// every operation here is a bounded, fast append or point lookup.
pub struct StorageEngine {
    conn: Mutex<Connection>,
}

impl StorageEngine {
    /// Open a storage engine backed by a file on disk.
    pub fn open(path: &Path) -> BeaconResult<Self> {
        let conn = Connection::open(path).map_err(|e| to_storage_err(e.to_string()))?;
        Self::initialize(conn)
    }

    /// Open an in-memory storage engine (for testing).
    pub fn open_in_memory() -> BeaconResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| to_storage_err(e.to_string()))?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> BeaconResult<Self> {
        pragmas::apply_pragmas(&conn)?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a closure against the connection. The mutex serializes the queue's
    /// sequence assignment; peek and enqueue interleave but never corrupt
    /// ordering because each sees a consistent snapshot.
    fn with_conn<F, T>(&self, f: F) -> BeaconResult<T>
    where
        F: FnOnce(&Connection) -> BeaconResult<T>,
    {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| {
            // A panic mid-query cannot leave SQLite in a torn state; the
            // transaction either committed or rolled back.
            poisoned.into_inner()
        });
        f(&conn)
    }

    // --- Queue ---

    /// Append a record; durable before this returns.
    pub fn enqueue(
        &self,
        instance_id: &str,
        record: &EventRecord,
        capacity: usize,
    ) -> BeaconResult<QueueEntry> {
        self.with_conn(|conn| queue_ops::enqueue(conn, instance_id, record, capacity))
    }

    /// Ordered batch extraction. Undecodable rows are removed in passing.
    pub fn peek_batch(
        &self,
        instance_id: &str,
        max_count: usize,
        max_bytes: usize,
    ) -> BeaconResult<Vec<QueueEntry>> {
        self.with_conn(|conn| queue_ops::peek_batch(conn, instance_id, max_count, max_bytes))
    }

    /// Remove exactly the given entries after the uploader accepted them.
    pub fn acknowledge(&self, instance_id: &str, seqs: &[i64]) -> BeaconResult<usize> {
        self.with_conn(|conn| queue_ops::acknowledge(conn, instance_id, seqs))
    }

    /// Remove every queued entry for the instance.
    pub fn purge(&self, instance_id: &str) -> BeaconResult<usize> {
        self.with_conn(|conn| queue_ops::purge(conn, instance_id))
    }

    /// Remove every queued entry except `keep_seq`.
    pub fn purge_except(&self, instance_id: &str, keep_seq: i64) -> BeaconResult<usize> {
        self.with_conn(|conn| queue_ops::purge_except(conn, instance_id, keep_seq))
    }

    pub fn queue_len(&self, instance_id: &str) -> BeaconResult<usize> {
        self.with_conn(|conn| queue_ops::queue_len(conn, instance_id))
    }

    // --- Instance state ---

    pub fn get_state(&self, instance_id: &str, key: &str) -> BeaconResult<Option<String>> {
        self.with_conn(|conn| state_ops::get_state(conn, instance_id, key))
    }

    pub fn set_state(&self, instance_id: &str, key: &str, value: &str) -> BeaconResult<()> {
        self.with_conn(|conn| state_ops::set_state(conn, instance_id, key, value))
    }

    /// Set a state value only if absent; returns whether this call won.
    pub fn set_state_if_absent(
        &self,
        instance_id: &str,
        key: &str,
        value: &str,
    ) -> BeaconResult<bool> {
        self.with_conn(|conn| state_ops::set_state_if_absent(conn, instance_id, key, value))
    }

    pub fn delete_state(&self, instance_id: &str, key: &str) -> BeaconResult<()> {
        self.with_conn(|conn| state_ops::delete_state(conn, instance_id, key))
    }

    /// The device-wide id, created on first use and stable afterwards.
    pub fn get_or_create_device_id(&self) -> BeaconResult<String> {
        self.with_conn(state_ops::get_or_create_device_id)
    }
}
