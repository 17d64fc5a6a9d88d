//! Per-job driver: submit once, then poll until a terminal state.
//!
//! Every await point (submission, status query, sleeps) is raced against
//! the job's cancellation token. A cancelled driver exits without
//! touching the registry; whoever cancelled it already recorded the
//! terminal state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use colorbook_core::job::{Backend, JobKey, JobState, ProviderTask};
use colorbook_core::params::JobParams;
use colorbook_providers::Submission;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::registry::JobRegistry;

/// Run one job to completion. Spawned by [`JobRegistry::start`].
pub(crate) async fn drive(
    registry: Arc<JobRegistry>,
    key: JobKey,
    job_id: Uuid,
    params: JobParams,
    cancel: CancellationToken,
) {
    let job_type = key.job_type;
    let provider = Arc::clone(registry.provider());

    let Some(submission) = until_cancelled(&cancel, provider.submit(job_type, &params)).await
    else {
        return;
    };

    let task = match submission {
        Ok(Submission::Accepted(task)) => task,
        Ok(Submission::Finished(outcome)) => {
            // Inline providers still pass through Polling so observers
            // see the same sequence as for queued work.
            let inline = ProviderTask {
                backend: Backend::Text,
                task_id: job_id.to_string(),
            };
            if registry
                .update(&key, job_id, |job| job.begin_polling(inline))
                .await
                .is_some()
            {
                registry
                    .update(&key, job_id, |job| job.apply_outcome(outcome).map(|_| ()))
                    .await;
            }
            return;
        }
        Err(e) => {
            tracing::warn!(job_id = %job_id, key = %key, error = %e, "Submission failed");
            registry
                .update(&key, job_id, |job| job.fail(e.to_string()))
                .await;
            return;
        }
    };

    tracing::debug!(job_id = %job_id, task_id = %task.task_id, "Provider accepted task");
    let accepted = task.clone();
    if registry
        .update(&key, job_id, |job| job.begin_polling(accepted))
        .await
        .is_none()
    {
        return;
    }

    let config = registry.config().clone();
    if !sleep_or_cancel(&cancel, config.initial_delay).await {
        return;
    }

    let max_attempts = config.max_attempts(job_type);
    let mut consecutive_errors = 0u32;

    loop {
        let Some(job) = registry
            .update(&key, job_id, |job| {
                if job.attempts >= max_attempts {
                    job.time_out(max_attempts)
                } else {
                    job.record_attempt().map(|_| ())
                }
            })
            .await
        else {
            return;
        };
        if job.state != JobState::Polling {
            return;
        }
        let attempt = job.attempts;

        let Some(result) = until_cancelled(&cancel, provider.query(job_type, &task)).await else {
            return;
        };

        match result {
            Ok(outcome) => {
                consecutive_errors = 0;
                tracing::debug!(
                    job_id = %job_id,
                    attempt,
                    status = ?outcome.status,
                    progress = ?outcome.progress,
                    "Status received",
                );
                match registry
                    .update(&key, job_id, |job| job.apply_outcome(outcome).map(|_| ()))
                    .await
                {
                    Some(job) if job.state == JobState::Polling => {}
                    _ => return,
                }
            }
            Err(e) if e.is_retryable() && consecutive_errors < config.retry_budget => {
                consecutive_errors += 1;
                tracing::warn!(
                    job_id = %job_id,
                    attempt,
                    consecutive_errors,
                    error = %e,
                    "Status query failed, will retry",
                );
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, attempt, error = %e, "Status query failed");
                let reason = if e.is_retryable() {
                    format!("{e} (after {} consecutive errors)", consecutive_errors + 1)
                } else {
                    e.to_string()
                };
                registry
                    .update(&key, job_id, |job| job.fail(reason))
                    .await;
                return;
            }
        }

        if !sleep_or_cancel(&cancel, config.interval).await {
            return;
        }
    }
}

/// Await `fut` unless `cancel` fires first.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

/// Sleep for `delay`; `false` if cancelled meanwhile.
async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
    until_cancelled(cancel, tokio::time::sleep(delay))
        .await
        .is_some()
}
