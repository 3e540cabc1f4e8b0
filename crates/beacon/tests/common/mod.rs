//! Shared test collaborators: a capturing uploader and a settable probe.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use beacon::{ConnectivityProbe, EventRecord, NetworkClass, UploadFailure, Uploader};

/// Route diagnostics to the test harness; honored lazily so every fixture
/// can call it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Captures every uploaded record; can be switched to fail.
pub struct CapturingUploader {
    pub sent: Mutex<Vec<EventRecord>>,
    pub failing: AtomicBool,
}

impl CapturingUploader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        })
    }

    pub fn sent_names(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.name.clone().unwrap_or_default())
            .collect()
    }
}

impl Uploader for CapturingUploader {
    fn send(&self, batch: &[EventRecord]) -> Result<(), UploadFailure> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(UploadFailure::transient("injected failure"));
        }
        self.sent.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }
}

/// A probe whose network class tests can flip at runtime.
pub struct SettableProbe(pub Mutex<NetworkClass>);

impl SettableProbe {
    pub fn wifi() -> Arc<Self> {
        Arc::new(Self(Mutex::new(NetworkClass::Wifi)))
    }

    pub fn set(&self, class: NetworkClass) {
        *self.0.lock().unwrap() = class;
    }
}

impl ConnectivityProbe for SettableProbe {
    fn network_class(&self) -> NetworkClass {
        *self.0.lock().unwrap()
    }
}

/// Poll until `predicate` returns true or two seconds elapse.
pub fn wait_for(mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    false
}
