/// Flush-path errors. Upload failures themselves are not errors here: they
/// stay inside the worker as [`UploadFailure`](crate::traits::UploadFailure)
/// and arm the backoff, with queue entries left intact.
#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error("flush scheduler for instance {instance_id} already shut down")]
    SchedulerStopped { instance_id: String },
}
