//! The provider contract consumed by the job pipeline.

use async_trait::async_trait;
use colorbook_core::job::{JobType, PollOutcome, ProviderTask};
use colorbook_core::params::JobParams;

use crate::error::ProviderError;

/// Result of submitting work to a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The provider queued the work; poll the returned task.
    Accepted(ProviderTask),
    /// The provider did the work inline (text models); no polling needed.
    Finished(PollOutcome),
}

/// An external service that runs jobs asynchronously.
///
/// Implementations only translate their native request/response shapes;
/// state transitions, retries and timeouts belong to the caller.
#[async_trait]
pub trait TaskProvider: Send + Sync {
    /// Create a provider task for `job_type`.
    async fn submit(
        &self,
        job_type: JobType,
        params: &JobParams,
    ) -> Result<Submission, ProviderError>;

    /// Fetch the current normalized status of a previously accepted task.
    async fn query(
        &self,
        job_type: JobType,
        task: &ProviderTask,
    ) -> Result<PollOutcome, ProviderError>;
}
