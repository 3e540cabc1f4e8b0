//! # beacon-flush
//!
//! Per-instance flush scheduling: a dedicated worker thread drains the
//! durable queue through the injected uploader. At most one flush is in
//! flight per instance by construction; callers of `flush()` never block.

pub mod backoff;
pub mod policy;
pub mod scheduler;

pub use backoff::Backoff;
pub use policy::network_allows_upload;
pub use scheduler::{
    AttemptOutcome, ConsentSource, DeferReason, FlushScheduler, FlushTrigger, FlushWorker,
    WorkerConfig,
};
