use crate::event::EventRecord;

/// Why an upload did not succeed. `retryable` distinguishes transient
/// network failures (backoff and retry) from permanent rejections.
#[derive(Debug, Clone)]
pub struct UploadFailure {
    pub reason: String,
    pub retryable: bool,
}

impl UploadFailure {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: true,
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: false,
        }
    }
}

/// Transmits a batch to the collection endpoint. Invoked only by the flush
/// scheduler, off the caller's thread. Must be idempotent-safe under retry:
/// the scheduler re-sends a batch after a transient failure.
pub trait Uploader: Send + Sync {
    fn send(&self, batch: &[EventRecord]) -> Result<(), UploadFailure>;
}
