//! Flush worker behavior: drain and acknowledge, network-policy deferral,
//! consent gating, failure backoff, manual-retry semantics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;

use beacon_core::config::NetworkType;
use beacon_core::consent::ConsentState;
use beacon_core::event::{EventKind, EventRecord, Properties};
use beacon_core::traits::{ConnectivityProbe, NetworkClass, UploadFailure, Uploader};
use beacon_flush::{AttemptOutcome, ConsentSource, DeferReason, FlushWorker, WorkerConfig};
use beacon_storage::StorageEngine;

struct RecordingUploader {
    sent_batches: Mutex<Vec<usize>>,
    fail_first: AtomicUsize,
}

impl RecordingUploader {
    fn new() -> Self {
        Self {
            sent_batches: Mutex::new(Vec::new()),
            fail_first: AtomicUsize::new(0),
        }
    }

    fn failing(times: usize) -> Self {
        Self {
            sent_batches: Mutex::new(Vec::new()),
            fail_first: AtomicUsize::new(times),
        }
    }

    fn batches(&self) -> Vec<usize> {
        self.sent_batches.lock().unwrap().clone()
    }
}

impl Uploader for RecordingUploader {
    fn send(&self, batch: &[EventRecord]) -> Result<(), UploadFailure> {
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(UploadFailure::transient("connection reset"));
        }
        self.sent_batches.lock().unwrap().push(batch.len());
        Ok(())
    }
}

struct FixedProbe(Mutex<NetworkClass>);

impl FixedProbe {
    fn new(class: NetworkClass) -> Self {
        Self(Mutex::new(class))
    }

    fn set(&self, class: NetworkClass) {
        *self.0.lock().unwrap() = class;
    }
}

impl ConnectivityProbe for FixedProbe {
    fn network_class(&self) -> NetworkClass {
        *self.0.lock().unwrap()
    }
}

struct FixedConsent(Mutex<ConsentState>);

impl ConsentSource for FixedConsent {
    fn consent(&self) -> ConsentState {
        *self.0.lock().unwrap()
    }
}

fn make_record(i: usize) -> EventRecord {
    EventRecord {
        kind: EventKind::Track,
        name: Some(format!("event_{i}")),
        properties: Properties::new(),
        time: Utc::now(),
        zone_offset_minutes: 0,
        distinct_id: "d-1".into(),
        account_id: None,
        device_id: "dev-1".into(),
        instance_id: "app".into(),
    }
}

struct Rig {
    storage: Arc<StorageEngine>,
    uploader: Arc<RecordingUploader>,
    probe: Arc<FixedProbe>,
    consent: Arc<FixedConsent>,
    worker: FlushWorker,
}

fn make_rig(uploader: RecordingUploader, policy: NetworkType, batch_size: usize) -> Rig {
    let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
    let uploader = Arc::new(uploader);
    let probe = Arc::new(FixedProbe::new(NetworkClass::Wifi));
    let consent = Arc::new(FixedConsent(Mutex::new(ConsentState::Tracking)));
    let config = WorkerConfig {
        instance_id: "app".into(),
        batch_size,
        max_batch_bytes: usize::MAX,
        flush_interval: Duration::from_secs(3600),
        backoff_base: Duration::from_secs(60),
        backoff_cap: Duration::from_secs(600),
    };
    let worker = FlushWorker::new(
        config,
        Arc::clone(&storage),
        uploader.clone() as Arc<dyn Uploader>,
        probe.clone() as Arc<dyn ConnectivityProbe>,
        consent.clone() as Arc<dyn ConsentSource>,
        Arc::new(RwLock::new(policy)),
    );
    Rig {
        storage,
        uploader,
        probe,
        consent,
        worker,
    }
}

#[test]
fn drains_queue_in_batches_and_acknowledges() {
    let mut rig = make_rig(RecordingUploader::new(), NetworkType::Default, 4);
    for i in 0..10 {
        rig.storage.enqueue("app", &make_record(i), 100).unwrap();
    }

    let outcome = rig.worker.attempt(false);
    assert_eq!(outcome, AttemptOutcome::Flushed { sent: 10 });
    assert_eq!(rig.uploader.batches(), vec![4, 4, 2]);
    assert_eq!(rig.storage.queue_len("app").unwrap(), 0);
}

#[test]
fn empty_queue_is_nothing_to_send() {
    let mut rig = make_rig(RecordingUploader::new(), NetworkType::Default, 4);
    assert_eq!(rig.worker.attempt(false), AttemptOutcome::NothingToSend);
}

#[test]
fn wifi_only_policy_defers_on_cellular() {
    let mut rig = make_rig(RecordingUploader::new(), NetworkType::WifiOnly, 4);
    for i in 0..3 {
        rig.storage.enqueue("app", &make_record(i), 100).unwrap();
    }

    rig.probe.set(NetworkClass::Cellular);
    let outcome = rig.worker.attempt(false);
    assert_eq!(
        outcome,
        AttemptOutcome::Deferred(DeferReason::NetworkPolicyUnsatisfied)
    );
    // Deferred, not dropped: the queue is intact.
    assert_eq!(rig.storage.queue_len("app").unwrap(), 3);

    // Connectivity becomes wifi, the same records go out.
    rig.probe.set(NetworkClass::Wifi);
    assert_eq!(rig.worker.attempt(false), AttemptOutcome::Flushed { sent: 3 });
    assert_eq!(rig.storage.queue_len("app").unwrap(), 0);
}

#[test]
fn consent_gates_flush() {
    let mut rig = make_rig(RecordingUploader::new(), NetworkType::Default, 4);
    rig.storage.enqueue("app", &make_record(0), 100).unwrap();

    *rig.consent.0.lock().unwrap() = ConsentState::Paused;
    assert_eq!(
        rig.worker.attempt(true),
        AttemptOutcome::Deferred(DeferReason::ConsentForbids)
    );
    assert_eq!(rig.storage.queue_len("app").unwrap(), 1);

    // OptedOutDeleted still flushes so the pending user_delete drains.
    *rig.consent.0.lock().unwrap() = ConsentState::OptedOutDeleted;
    assert_eq!(rig.worker.attempt(true), AttemptOutcome::Flushed { sent: 1 });
}

#[test]
fn failure_leaves_queue_and_arms_backoff() {
    let mut rig = make_rig(RecordingUploader::failing(1), NetworkType::Default, 4);
    for i in 0..3 {
        rig.storage.enqueue("app", &make_record(i), 100).unwrap();
    }

    assert_eq!(rig.worker.attempt(false), AttemptOutcome::Failed);
    assert_eq!(rig.storage.queue_len("app").unwrap(), 3);

    // Automatic attempts are now gated by backoff.
    assert_eq!(
        rig.worker.attempt(false),
        AttemptOutcome::Deferred(DeferReason::BackoffNotDue)
    );

    // A manual flush bypasses the gate and succeeds (failure streak spent).
    rig.worker.reset_backoff();
    assert_eq!(rig.worker.attempt(true), AttemptOutcome::Flushed { sent: 3 });
    assert_eq!(rig.storage.queue_len("app").unwrap(), 0);
}

#[test]
fn batch_order_matches_enqueue_order() {
    let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
    let names = Arc::new(Mutex::new(Vec::<String>::new()));

    struct OrderUploader(Arc<Mutex<Vec<String>>>);
    impl Uploader for OrderUploader {
        fn send(&self, batch: &[EventRecord]) -> Result<(), UploadFailure> {
            let mut names = self.0.lock().unwrap();
            for record in batch {
                names.push(record.name.clone().unwrap_or_default());
            }
            Ok(())
        }
    }

    for i in 0..7 {
        storage.enqueue("app", &make_record(i), 100).unwrap();
    }

    let config = WorkerConfig {
        instance_id: "app".into(),
        batch_size: 3,
        max_batch_bytes: usize::MAX,
        flush_interval: Duration::from_secs(3600),
        backoff_base: Duration::from_secs(60),
        backoff_cap: Duration::from_secs(600),
    };
    let mut worker = FlushWorker::new(
        config,
        Arc::clone(&storage),
        Arc::new(OrderUploader(Arc::clone(&names))),
        Arc::new(FixedProbe::new(NetworkClass::Wifi)),
        Arc::new(FixedConsent(Mutex::new(ConsentState::Tracking))),
        Arc::new(RwLock::new(NetworkType::Default)),
    );

    assert_eq!(worker.attempt(false), AttemptOutcome::Flushed { sent: 7 });
    let names = names.lock().unwrap();
    let expected: Vec<String> = (0..7).map(|i| format!("event_{i}")).collect();
    assert_eq!(*names, expected, "no reordering across flush boundaries");
}
