//! In-memory registry of polling jobs keyed by `(subject_key, job_type)`.
//!
//! [`JobRegistry`] owns every job record. Each started job gets a driver
//! task (see [`crate::poller`]) with its own [`CancellationToken`], a
//! child of the registry's master token. Drivers never hold a job; they
//! report back through [`JobRegistry::update`], which drops the change
//! unless the job id is still the one registered for the key and the job
//! is not terminal. A superseded or cancelled job can therefore never be
//! overwritten by a late provider response.
//!
//! Terminal jobs stay under their key for the grace period so the UI can
//! render the final state, then move to a bounded retired map that only
//! serves [`JobRegistry::get_by_id`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use colorbook_core::error::CoreError;
use colorbook_core::job::{Job, JobKey, JobType, TransitionError, CANCELLED_BY_USER, SUPERSEDED};
use colorbook_core::params::JobParams;
use colorbook_providers::TaskProvider;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::PollingConfig;
use crate::events::JobEvent;
use crate::poller;

/// Broadcast channel capacity for job events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum number of retired jobs kept for lookups by id.
const RETIRED_CAPACITY: usize = 1024;

/// Reason recorded on jobs still running at shutdown.
const SHUTTING_DOWN: &str = "server shutting down";

/// Maximum length of a subject key.
const MAX_SUBJECT_KEY_LEN: usize = 200;

/// Shared handle to all polling jobs.
///
/// Created once at startup via [`JobRegistry::new`]; clone the `Arc`
/// into request handlers and the batch coordinator.
pub struct JobRegistry {
    inner: RwLock<Inner>,
    provider: Arc<dyn TaskProvider>,
    config: PollingConfig,
    event_tx: broadcast::Sender<JobEvent>,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
}

#[derive(Default)]
pub(crate) struct Inner {
    active: HashMap<JobKey, ActiveJob>,
    retired: HashMap<Uuid, Job>,
    retired_order: VecDeque<Uuid>,
}

/// A job registered under its key plus the token stopping its driver.
struct ActiveJob {
    job: Job,
    cancel: CancellationToken,
}

impl Inner {
    fn find(&self, job_id: Uuid) -> Option<&Job> {
        self.active
            .values()
            .map(|a| &a.job)
            .find(|j| j.id == job_id)
            .or_else(|| self.retired.get(&job_id))
    }

    fn retire(&mut self, job: Job) {
        if self.retired.insert(job.id, job.clone()).is_none() {
            self.retired_order.push_back(job.id);
        }
        while self.retired_order.len() > RETIRED_CAPACITY {
            if let Some(oldest) = self.retired_order.pop_front() {
                self.retired.remove(&oldest);
            }
        }
    }
}

impl JobRegistry {
    pub fn new(provider: Arc<dyn TaskProvider>, config: PollingConfig) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            inner: RwLock::new(Inner::default()),
            provider,
            config,
            event_tx,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    pub(crate) fn provider(&self) -> &Arc<dyn TaskProvider> {
        &self.provider
    }

    /// Start a job for `(subject_key, job_type)`.
    ///
    /// Parameters are validated first; on failure no job is created and
    /// nothing running is touched. Otherwise any non-terminal job for the
    /// same key is cancelled as superseded, and a fresh `Created` job is
    /// registered and handed to a new driver task.
    pub async fn start(
        self: &Arc<Self>,
        subject_key: &str,
        job_type: JobType,
        params: JobParams,
    ) -> Result<Job, CoreError> {
        let subject_key = validate_subject_key(subject_key)?;
        params.validate_for(job_type)?;

        if self.cancel.is_cancelled() {
            return Err(CoreError::Conflict("job registry is shutting down".into()));
        }

        let key = JobKey::new(subject_key, job_type);
        let job = Job::new(key.clone());
        let token = self.cancel.child_token();

        {
            let mut inner = self.inner.write().await;
            if let Some(mut previous) = inner.active.remove(&key) {
                if !previous.job.is_terminal() {
                    previous.cancel.cancel();
                    if previous.job.cancel(SUPERSEDED).is_ok() {
                        tracing::info!(
                            job_id = %previous.job.id,
                            subject_key = %key.subject_key,
                            job_type = %job_type,
                            "Job superseded",
                        );
                        self.publish(&previous.job);
                    }
                }
                inner.retire(previous.job);
            }

            inner.active.insert(
                key.clone(),
                ActiveJob {
                    job: job.clone(),
                    cancel: token.clone(),
                },
            );
            self.publish(&job);
        }

        tracing::info!(
            job_id = %job.id,
            subject_key = %key.subject_key,
            job_type = %job_type,
            "Job started",
        );

        let registry = Arc::clone(self);
        let job_id = job.id;
        tokio::spawn(async move {
            poller::drive(registry, key, job_id, params, token).await;
        });

        Ok(job)
    }

    /// Current (or recently finished) job for a key.
    pub async fn get(&self, subject_key: &str, job_type: JobType) -> Option<Job> {
        let key = JobKey::new(subject_key, job_type);
        self.inner.read().await.active.get(&key).map(|a| a.job.clone())
    }

    /// Job by id, including superseded and retired ones.
    pub async fn get_by_id(&self, job_id: Uuid) -> Option<Job> {
        self.inner.read().await.find(job_id).cloned()
    }

    /// Cancel the job registered for a key.
    ///
    /// Returns `None` when no job is registered. A job that is already
    /// terminal is returned unchanged.
    pub async fn cancel(self: &Arc<Self>, subject_key: &str, job_type: JobType) -> Option<Job> {
        let key = JobKey::new(subject_key, job_type);
        let mut inner = self.inner.write().await;
        let active = inner.active.get_mut(&key)?;
        if active.job.is_terminal() {
            return Some(active.job.clone());
        }

        active.cancel.cancel();
        if let Err(e) = active.job.cancel(CANCELLED_BY_USER) {
            tracing::debug!(job_id = %active.job.id, error = %e, "Cancel discarded");
            return Some(active.job.clone());
        }

        let job = active.job.clone();
        drop(inner);

        tracing::info!(
            job_id = %job.id,
            subject_key = %key.subject_key,
            job_type = %job_type,
            "Job cancelled",
        );
        self.publish(&job);
        self.schedule_retirement(key, job.id);
        Some(job)
    }

    /// `true` while a non-terminal job exists for the key.
    pub async fn is_busy(&self, subject_key: &str, job_type: JobType) -> bool {
        let key = JobKey::new(subject_key, job_type);
        self.inner
            .read()
            .await
            .active
            .get(&key)
            .map_or(false, |a| !a.job.is_terminal())
    }

    /// Every job registered for one subject, ordered by job type.
    pub async fn list_subject(&self, subject_key: &str) -> Vec<Job> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<Job> = inner
            .active
            .values()
            .filter(|a| a.job.key.subject_key == subject_key)
            .map(|a| a.job.clone())
            .collect();
        jobs.sort_by_key(|j| j.key.job_type);
        jobs
    }

    /// All non-terminal jobs, oldest first.
    pub async fn list_active(&self) -> Vec<Job> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<Job> = inner
            .active
            .values()
            .filter(|a| !a.job.is_terminal())
            .map(|a| a.job.clone())
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Subscribe to job lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Stop every driver and mark running jobs cancelled.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job registry");
        self.cancel.cancel();

        let mut inner = self.inner.write().await;
        let mut cancelled = 0usize;
        for active in inner.active.values_mut() {
            if active.job.cancel(SHUTTING_DOWN).is_ok() {
                cancelled += 1;
                self.publish(&active.job);
            }
        }

        tracing::info!(cancelled, "Job registry shut down complete");
    }

    /// Apply `change` to the job registered for `key`, if it is still `job_id`.
    ///
    /// The check and the mutation happen under one write lock. Returns
    /// the updated snapshot, or `None` if the change was discarded because
    /// the job was replaced, is terminal, or rejected the transition.
    pub(crate) async fn update<F>(self: &Arc<Self>, key: &JobKey, job_id: Uuid, change: F) -> Option<Job>
    where
        F: FnOnce(&mut Job) -> Result<(), TransitionError>,
    {
        let mut inner = self.inner.write().await;
        let Some(active) = inner.active.get_mut(key).filter(|a| a.job.id == job_id) else {
            tracing::debug!(job_id = %job_id, key = %key, "Discarding update for replaced job");
            return None;
        };
        if active.job.is_terminal() {
            tracing::debug!(
                job_id = %job_id,
                state = %active.job.state,
                "Discarding update for terminal job",
            );
            return None;
        }

        let before = (active.job.state, active.job.progress);
        if let Err(e) = change(&mut active.job) {
            tracing::debug!(job_id = %job_id, error = %e, "Discarding rejected transition");
            return None;
        }

        let job = active.job.clone();
        drop(inner);

        if (job.state, job.progress) != before {
            self.publish(&job);
        }
        if job.is_terminal() {
            tracing::info!(
                job_id = %job.id,
                subject_key = %job.key.subject_key,
                job_type = %job.key.job_type,
                state = %job.state,
                error = job.error.as_deref().unwrap_or(""),
                "Job finished",
            );
            self.schedule_retirement(key.clone(), job.id);
        }
        Some(job)
    }

    /// Hold the registry lock; every start stalls until the guard drops.
    #[cfg(test)]
    pub(crate) async fn hold_lock(&self) -> tokio::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().await
    }

    // ---- private helpers ----

    fn publish(&self, job: &Job) {
        // A send error only means nobody is subscribed.
        let _ = self.event_tx.send(JobEvent::from_job(job));
    }

    /// Move a terminal job out of the active map once the grace period ends.
    fn schedule_retirement(self: &Arc<Self>, key: JobKey, job_id: Uuid) {
        let registry = Arc::clone(self);
        let grace = self.config.grace_period;
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(grace) => registry.retire(&key, job_id).await,
            }
        });
    }

    async fn retire(&self, key: &JobKey, job_id: Uuid) {
        let mut inner = self.inner.write().await;
        let expired = inner
            .active
            .get(key)
            .map_or(false, |a| a.job.id == job_id && a.job.is_terminal());
        if !expired {
            return;
        }
        if let Some(active) = inner.active.remove(key) {
            tracing::debug!(job_id = %job_id, key = %key, "Job retired");
            inner.retire(active.job);
        }
    }
}

fn validate_subject_key(subject_key: &str) -> Result<&str, CoreError> {
    let trimmed = subject_key.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("subject_key must not be empty".into()));
    }
    if trimmed.len() > MAX_SUBJECT_KEY_LEN {
        return Err(CoreError::Validation(format!(
            "subject_key must not exceed {MAX_SUBJECT_KEY_LEN} characters"
        )));
    }
    Ok(trimmed)
}
