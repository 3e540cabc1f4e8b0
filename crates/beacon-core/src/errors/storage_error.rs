/// Storage-layer errors for the durable queue and persisted instance state.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("queue entry {seq} for instance {instance_id} is not decodable: {reason}")]
    UndecodableEntry {
        instance_id: String,
        seq: i64,
        reason: String,
    },
}
