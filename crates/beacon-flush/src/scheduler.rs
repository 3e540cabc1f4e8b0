//! FlushScheduler: per-instance worker thread driving upload attempts.
//!
//! State machine per instance is Idle -> Flushing -> Idle; the single worker
//! thread makes concurrent re-entry impossible. Triggers arrive over an mpsc
//! channel; the periodic tick falls out of `recv_timeout`.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use beacon_core::config::NetworkType;
use beacon_core::consent::ConsentState;
use beacon_core::errors::{BeaconResult, FlushError};
use beacon_core::traits::{ConnectivityProbe, Uploader};
use beacon_storage::StorageEngine;

use crate::backoff::Backoff;
use crate::policy::network_allows_upload;

/// Snapshot source for the owning instance's consent state. Implemented by
/// the SDK facade; the worker reads it before every attempt so an opt-out
/// between tick and dispatch is honored.
pub trait ConsentSource: Send + Sync {
    fn consent(&self) -> ConsentState;
}

/// Why a flush attempt was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Explicit `flush()` call. Resets backoff and retries immediately.
    Manual,
    /// Queue size crossed the high-water mark.
    HighWater,
    /// App moved to the background; one best-effort attempt.
    Background,
    /// Tear the worker down.
    Shutdown,
}

/// Why an attempt did not upload anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    ConsentForbids,
    NetworkPolicyUnsatisfied,
    BackoffNotDue,
}

/// Outcome of one flush attempt, surfaced for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Uploaded and acknowledged this many records.
    Flushed { sent: usize },
    /// Queue was empty.
    NothingToSend,
    /// Attempt skipped; queue untouched.
    Deferred(DeferReason),
    /// Upload failed; entries remain queued, backoff armed.
    Failed,
}

/// Everything a worker needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub instance_id: String,
    pub batch_size: usize,
    pub max_batch_bytes: usize,
    pub flush_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

/// The flush execution core. Kept separate from the thread plumbing so the
/// trigger/deferral/backoff behavior is testable without timing games.
pub struct FlushWorker {
    config: WorkerConfig,
    storage: Arc<StorageEngine>,
    uploader: Arc<dyn Uploader>,
    probe: Arc<dyn ConnectivityProbe>,
    consent: Arc<dyn ConsentSource>,
    /// Shared with the owning instance (and its parent, for light
    /// instances) so policy changes apply to in-flight schedulers.
    network_type: Arc<RwLock<NetworkType>>,
    backoff: Backoff,
}

impl FlushWorker {
    pub fn new(
        config: WorkerConfig,
        storage: Arc<StorageEngine>,
        uploader: Arc<dyn Uploader>,
        probe: Arc<dyn ConnectivityProbe>,
        consent: Arc<dyn ConsentSource>,
        network_type: Arc<RwLock<NetworkType>>,
    ) -> Self {
        let backoff = Backoff::new(config.backoff_base, config.backoff_cap);
        Self {
            config,
            storage,
            uploader,
            probe,
            consent,
            network_type,
            backoff,
        }
    }

    /// Run one flush attempt. `bypass_backoff` is set for manual and
    /// background triggers; automatic ticks honor the armed delay.
    pub fn attempt(&mut self, bypass_backoff: bool) -> AttemptOutcome {
        if !self.consent.consent().allows_flush() {
            return AttemptOutcome::Deferred(DeferReason::ConsentForbids);
        }
        if !bypass_backoff && !self.backoff.is_due() {
            return AttemptOutcome::Deferred(DeferReason::BackoffNotDue);
        }
        let policy = *self.network_type.read().unwrap_or_else(|e| e.into_inner());
        if !network_allows_upload(policy, self.probe.network_class()) {
            tracing::debug!(
                instance_id = %self.config.instance_id,
                "flush deferred: network policy unsatisfied"
            );
            return AttemptOutcome::Deferred(DeferReason::NetworkPolicyUnsatisfied);
        }

        let mut total_sent = 0usize;
        loop {
            let batch = match self.storage.peek_batch(
                &self.config.instance_id,
                self.config.batch_size,
                self.config.max_batch_bytes,
            ) {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(
                        instance_id = %self.config.instance_id,
                        error = %e,
                        "flush aborted: peek failed"
                    );
                    return AttemptOutcome::Failed;
                }
            };
            if batch.is_empty() {
                return if total_sent == 0 {
                    AttemptOutcome::NothingToSend
                } else {
                    AttemptOutcome::Flushed { sent: total_sent }
                };
            }

            let records: Vec<_> = batch.iter().map(|e| e.record.clone()).collect();
            match self.uploader.send(&records) {
                Ok(()) => {
                    let seqs: Vec<i64> = batch.iter().map(|e| e.seq).collect();
                    if let Err(e) = self.storage.acknowledge(&self.config.instance_id, &seqs) {
                        // Acknowledged-but-not-removed entries will be
                        // re-sent; the uploader contract tolerates that.
                        tracing::warn!(
                            instance_id = %self.config.instance_id,
                            error = %e,
                            "acknowledge failed after accepted upload"
                        );
                        return AttemptOutcome::Failed;
                    }
                    self.backoff.reset();
                    total_sent += batch.len();
                    tracing::debug!(
                        instance_id = %self.config.instance_id,
                        sent = batch.len(),
                        "batch uploaded"
                    );
                    // A short batch means the queue is drained.
                    if batch.len() < self.config.batch_size {
                        return AttemptOutcome::Flushed { sent: total_sent };
                    }
                }
                Err(failure) => {
                    tracing::warn!(
                        instance_id = %self.config.instance_id,
                        reason = %failure.reason,
                        retryable = failure.retryable,
                        "upload failed, entries remain queued"
                    );
                    self.backoff.record_failure();
                    return AttemptOutcome::Failed;
                }
            }
        }
    }

    /// Reset the retry backoff (manual flush semantics).
    pub fn reset_backoff(&mut self) {
        self.backoff.reset();
    }
}

/// Owns the worker thread and the trigger channel. Dropping the scheduler
/// shuts the worker down and joins it.
pub struct FlushScheduler {
    trigger_tx: Sender<FlushTrigger>,
    handle: Option<JoinHandle<()>>,
    instance_id: String,
}

impl FlushScheduler {
    /// Spawn the worker thread for one instance.
    pub fn spawn(mut worker: FlushWorker) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel::<FlushTrigger>();
        let instance_id = worker.config.instance_id.clone();
        let interval = worker.config.flush_interval;

        let handle = std::thread::spawn(move || {
            loop {
                match trigger_rx.recv_timeout(interval) {
                    Ok(FlushTrigger::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                    Ok(FlushTrigger::Manual) => {
                        worker.reset_backoff();
                        worker.attempt(true);
                    }
                    Ok(FlushTrigger::Background) => {
                        // Best-effort: one immediate attempt before the
                        // OS suspends us.
                        worker.attempt(true);
                    }
                    Ok(FlushTrigger::HighWater) | Err(RecvTimeoutError::Timeout) => {
                        worker.attempt(false);
                    }
                }
            }
        });

        Self {
            trigger_tx,
            handle: Some(handle),
            instance_id,
        }
    }

    fn send(&self, trigger: FlushTrigger) -> BeaconResult<()> {
        self.trigger_tx.send(trigger).map_err(|_| {
            FlushError::SchedulerStopped {
                instance_id: self.instance_id.clone(),
            }
            .into()
        })
    }

    /// Request an immediate flush. Never blocks on the upload itself.
    pub fn flush(&self) -> BeaconResult<()> {
        self.send(FlushTrigger::Manual)
    }

    /// Queue size crossed the configured high-water mark.
    pub fn notify_high_water(&self) -> BeaconResult<()> {
        self.send(FlushTrigger::HighWater)
    }

    /// App is moving to the background.
    pub fn notify_background(&self) -> BeaconResult<()> {
        self.send(FlushTrigger::Background)
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        let _ = self.trigger_tx.send(FlushTrigger::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
