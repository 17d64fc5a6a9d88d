//! Job lifecycle events broadcast by the registry.

use colorbook_core::job::{Job, JobKey, StatusView};
use colorbook_core::types::Timestamp;
use serde::Serialize;
use uuid::Uuid;

/// A visible change of one job: its state or progress moved.
///
/// Events for one job are published in order. Subscribers that fall
/// behind observe `RecvError::Lagged` and should resynchronize from the
/// registry by job id.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub key: JobKey,
    pub view: StatusView,
    /// `updated_at` of the job when the event was published.
    pub at: Timestamp,
}

impl JobEvent {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            key: job.key.clone(),
            view: job.status_view(),
            at: job.updated_at,
        }
    }
}
