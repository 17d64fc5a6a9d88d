//! Batch coordinator: one job per subject, aggregated into one report.
//!
//! A batch starts its jobs one by one, `batch_start_spacing` apart, and
//! follows them through the registry's event stream. A subscriber that
//! lags behind resynchronizes from the registry by job id. Items that
//! fail validation are reported as failed without affecting the rest.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use colorbook_core::error::CoreError;
use colorbook_core::job::{Job, JobKey, JobState, JobType, StatusView};
use colorbook_core::params::JobParams;
use colorbook_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::events::JobEvent;
use crate::registry::JobRegistry;

/// Maximum number of items in one batch.
pub const MAX_BATCH_ITEMS: usize = 500;

/// Finished batches kept for reporting before the oldest are dropped.
const MAX_FINISHED_BATCHES: usize = 100;

/// Message on items skipped because their batch was cancelled first.
const NOT_STARTED: &str = "batch cancelled before start";

/// One subject to process in a batch.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchItem {
    pub subject_key: String,
    /// Overrides the batch's shared parameters field by field.
    #[serde(default)]
    pub params: JobParams,
}

/// Per-subject progress inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectStatus {
    /// `None` until the job is started, and for items rejected by validation.
    pub job_id: Option<Uuid>,
    pub status: JobState,
    pub progress: u8,
    pub message: Option<String>,
    #[serde(skip)]
    updated_at: Option<Timestamp>,
}

impl SubjectStatus {
    fn pending() -> Self {
        Self {
            job_id: None,
            status: JobState::Created,
            progress: 0,
            message: Some("pending".into()),
            updated_at: None,
        }
    }

    fn rejected(status: JobState, message: String) -> Self {
        Self {
            job_id: None,
            status,
            progress: 0,
            message: Some(message),
            updated_at: None,
        }
    }

    fn of_job(job: &Job) -> Self {
        let view = job.status_view();
        Self {
            job_id: Some(job.id),
            status: view.status,
            progress: view.progress,
            message: view.message,
            updated_at: Some(job.updated_at),
        }
    }

    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Take a newer observation of the job; stale or post-terminal ones are ignored.
    fn observe(&mut self, job_id: Uuid, view: StatusView, at: Timestamp) {
        if self.is_terminal() || self.updated_at.map_or(false, |seen| at < seen) {
            return;
        }
        self.job_id = Some(job_id);
        self.status = view.status;
        self.progress = view.progress;
        self.message = view.message;
        self.updated_at = Some(at);
    }
}

/// Aggregate report of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchStatus {
    pub batch_id: Uuid,
    pub job_type: JobType,
    pub total_count: usize,
    /// Subjects in a terminal state.
    pub completed_count: usize,
    pub succeeded_count: usize,
    /// Terminal but not completed: failed, timed out or cancelled.
    pub failed_count: usize,
    pub done: bool,
    pub cancelled: bool,
    pub per_subject: BTreeMap<String, SubjectStatus>,
    pub created_at: Timestamp,
}

impl BatchStatus {
    fn recount(&mut self) {
        let terminal: Vec<JobState> = self
            .per_subject
            .values()
            .filter(|s| s.is_terminal())
            .map(|s| s.status)
            .collect();
        self.completed_count = terminal.len();
        self.succeeded_count = terminal
            .iter()
            .filter(|s| **s == JobState::Completed)
            .count();
        self.failed_count = self.completed_count - self.succeeded_count;
        self.done = self.completed_count == self.total_count;
    }
}

struct BatchEntry {
    status: BatchStatus,
    /// job id -> subject key, for jobs started by this batch.
    jobs: HashMap<Uuid, String>,
    /// Stops the starter and watcher tasks.
    stop: CancellationToken,
}

/// Starts and tracks batches of jobs.
pub struct BatchCoordinator {
    registry: Arc<JobRegistry>,
    batches: RwLock<HashMap<Uuid, BatchEntry>>,
    start_spacing: Duration,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
}

impl BatchCoordinator {
    pub fn new(registry: Arc<JobRegistry>) -> Arc<Self> {
        let start_spacing = registry.config().batch_start_spacing;
        Arc::new(Self {
            registry,
            batches: RwLock::new(HashMap::new()),
            start_spacing,
            cancel: CancellationToken::new(),
        })
    }

    /// Register a batch and start working through its items.
    ///
    /// Fails only for structural problems (no items, too many, duplicate
    /// subjects). Per-item validation problems are reported in the batch.
    pub async fn start_batch(
        self: &Arc<Self>,
        job_type: JobType,
        items: Vec<BatchItem>,
        shared: JobParams,
    ) -> Result<BatchStatus, CoreError> {
        if items.is_empty() {
            return Err(CoreError::Validation("batch must contain at least one item".into()));
        }
        if items.len() > MAX_BATCH_ITEMS {
            return Err(CoreError::Validation(format!(
                "batch must not exceed {MAX_BATCH_ITEMS} items"
            )));
        }
        let mut seen = HashSet::new();
        for item in &items {
            let key = item.subject_key.trim();
            if key.is_empty() {
                return Err(CoreError::Validation("subject_key must not be empty".into()));
            }
            if !seen.insert(key.to_string()) {
                return Err(CoreError::Validation(format!(
                    "duplicate subject_key '{key}' in batch"
                )));
            }
        }

        let batch_id = Uuid::new_v4();
        let status = BatchStatus {
            batch_id,
            job_type,
            total_count: items.len(),
            completed_count: 0,
            succeeded_count: 0,
            failed_count: 0,
            done: false,
            cancelled: false,
            per_subject: seen
                .into_iter()
                .map(|key| (key, SubjectStatus::pending()))
                .collect(),
            created_at: chrono::Utc::now(),
        };
        let stop = self.cancel.child_token();

        {
            let mut batches = self.batches.write().await;
            prune_finished(&mut batches);
            batches.insert(
                batch_id,
                BatchEntry {
                    status: status.clone(),
                    jobs: HashMap::new(),
                    stop: stop.clone(),
                },
            );
        }

        tracing::info!(
            batch_id = %batch_id,
            job_type = %job_type,
            total = status.total_count,
            "Batch started",
        );

        // Subscribe before the first start so no transition is missed.
        let events = self.registry.subscribe();
        let watcher = Arc::clone(self);
        let watch_stop = stop.clone();
        tokio::spawn(async move { watcher.watch(batch_id, events, watch_stop).await });

        let starter = Arc::clone(self);
        tokio::spawn(async move {
            starter
                .start_items(batch_id, job_type, items, shared, stop)
                .await
        });

        Ok(status)
    }

    pub async fn status(&self, batch_id: Uuid) -> Option<BatchStatus> {
        self.batches
            .read()
            .await
            .get(&batch_id)
            .map(|b| b.status.clone())
    }

    /// All known batches, newest first.
    pub async fn list(&self) -> Vec<BatchStatus> {
        let mut list: Vec<BatchStatus> = self
            .batches
            .read()
            .await
            .values()
            .map(|b| b.status.clone())
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    /// Stop pending starts and cancel the batch's running jobs.
    pub async fn cancel(&self, batch_id: Uuid) -> Option<BatchStatus> {
        let (jobs, job_type) = {
            let mut batches = self.batches.write().await;
            let entry = batches.get_mut(&batch_id)?;
            if entry.status.done {
                return Some(entry.status.clone());
            }
            entry.stop.cancel();
            entry.status.cancelled = true;
            (entry.jobs.clone(), entry.status.job_type)
        };

        let mut snapshots = Vec::new();
        for (job_id, subject_key) in jobs {
            self.cancel_if_current(&subject_key, job_type, job_id).await;
            if let Some(job) = self.registry.get_by_id(job_id).await {
                snapshots.push(job);
            }
        }

        let mut batches = self.batches.write().await;
        let entry = batches.get_mut(&batch_id)?;
        for job in &snapshots {
            observe_job(entry, job);
        }
        for subject in entry.status.per_subject.values_mut() {
            if subject.job_id.is_none() && !subject.is_terminal() {
                *subject = SubjectStatus::rejected(JobState::Cancelled, NOT_STARTED.into());
            }
        }
        entry.status.recount();

        tracing::info!(
            batch_id = %batch_id,
            completed = entry.status.completed_count,
            total = entry.status.total_count,
            "Batch cancelled",
        );
        Some(entry.status.clone())
    }

    /// Stop every batch task. Jobs themselves are stopped by the registry.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    // ---- private helpers ----

    /// Cancel `job_id` unless a newer job has replaced it under its key.
    async fn cancel_if_current(&self, subject_key: &str, job_type: JobType, job_id: Uuid) {
        let current = self
            .registry
            .get(subject_key, job_type)
            .await
            .map_or(false, |job| job.id == job_id);
        if current {
            self.registry.cancel(subject_key, job_type).await;
        }
    }

    async fn start_items(
        &self,
        batch_id: Uuid,
        job_type: JobType,
        items: Vec<BatchItem>,
        shared: JobParams,
        stop: CancellationToken,
    ) {
        for (index, item) in items.into_iter().enumerate() {
            if index > 0 {
                tokio::select! {
                    _ = stop.cancelled() => return,
                    _ = tokio::time::sleep(self.start_spacing) => {}
                }
            }
            if stop.is_cancelled() {
                return;
            }

            let subject_key = item.subject_key.trim().to_string();
            let params = item.params.merged_with(&shared);

            match self.registry.start(&subject_key, job_type, params).await {
                Ok(job) => {
                    // Events published before the job id was recorded are
                    // covered by reading the current snapshot afterwards.
                    let mut batches = self.batches.write().await;
                    let Some(entry) = batches.get_mut(&batch_id) else {
                        return;
                    };
                    entry.jobs.insert(job.id, subject_key.clone());
                    let cancelled = entry.status.cancelled;
                    drop(batches);

                    if !cancelled {
                        let current = self.registry.get_by_id(job.id).await.unwrap_or(job);
                        self.with_entry(batch_id, |entry| observe_job(entry, &current))
                            .await;
                        continue;
                    }

                    // The batch was cancelled while this start waited on the
                    // registry, after `cancel` had already collected its jobs.
                    self.cancel_if_current(&subject_key, job_type, job.id).await;
                    let current = self.registry.get_by_id(job.id).await.unwrap_or(job);
                    tracing::info!(
                        batch_id = %batch_id,
                        job_id = %current.id,
                        subject_key = %subject_key,
                        "Job started after batch cancel, cancelled",
                    );
                    self.with_entry(batch_id, |entry| {
                        entry
                            .status
                            .per_subject
                            .insert(subject_key.clone(), SubjectStatus::of_job(&current));
                    })
                    .await;
                    return;
                }
                Err(e) => {
                    tracing::info!(
                        batch_id = %batch_id,
                        subject_key = %subject_key,
                        error = %e,
                        "Batch item rejected",
                    );
                    self.with_entry(batch_id, |entry| {
                        entry.status.per_subject.insert(
                            subject_key.clone(),
                            SubjectStatus::rejected(JobState::Failed, e.to_string()),
                        );
                    })
                    .await;
                }
            }
        }
    }

    async fn watch(
        &self,
        batch_id: Uuid,
        mut events: broadcast::Receiver<JobEvent>,
        stop: CancellationToken,
    ) {
        loop {
            let received = tokio::select! {
                _ = stop.cancelled() => return,
                r = events.recv() => r,
            };

            match received {
                Ok(event) => {
                    self.with_entry(batch_id, |entry| {
                        if let Some(subject_key) = entry.jobs.get(&event.job_id).cloned() {
                            if let Some(subject) = entry.status.per_subject.get_mut(&subject_key) {
                                subject.observe(event.job_id, event.view, event.at);
                            }
                        }
                    })
                    .await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(batch_id = %batch_id, skipped, "Batch watcher lagged, resyncing");
                    self.resync(batch_id).await;
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    /// Rebuild per-subject state from the registry.
    async fn resync(&self, batch_id: Uuid) {
        let jobs: Vec<Uuid> = match self.batches.read().await.get(&batch_id) {
            Some(entry) => entry.jobs.keys().copied().collect(),
            None => return,
        };
        let mut snapshots = Vec::with_capacity(jobs.len());
        for job_id in jobs {
            if let Some(job) = self.registry.get_by_id(job_id).await {
                snapshots.push(job);
            }
        }
        self.with_entry(batch_id, |entry| {
            for job in &snapshots {
                observe_job(entry, job);
            }
        })
        .await;
    }

    /// Mutate a batch entry, then recount and stop its tasks once done.
    async fn with_entry<F>(&self, batch_id: Uuid, f: F)
    where
        F: FnOnce(&mut BatchEntry),
    {
        let mut batches = self.batches.write().await;
        let Some(entry) = batches.get_mut(&batch_id) else {
            return;
        };
        let was_done = entry.status.done;
        f(entry);
        entry.status.recount();
        if entry.status.done && !was_done {
            entry.stop.cancel();
            tracing::info!(
                batch_id = %batch_id,
                succeeded = entry.status.succeeded_count,
                failed = entry.status.failed_count,
                "Batch finished",
            );
        }
    }
}

fn observe_job(entry: &mut BatchEntry, job: &Job) {
    let JobKey { subject_key, .. } = &job.key;
    if entry.jobs.get(&job.id) != Some(subject_key) {
        return;
    }
    if let Some(subject) = entry.status.per_subject.get_mut(subject_key) {
        subject.observe(job.id, job.status_view(), job.updated_at);
    }
}

/// Drop the oldest finished batches beyond [`MAX_FINISHED_BATCHES`].
fn prune_finished(batches: &mut HashMap<Uuid, BatchEntry>) {
    let mut finished: Vec<(Timestamp, Uuid)> = batches
        .values()
        .filter(|b| b.status.done)
        .map(|b| (b.status.created_at, b.status.batch_id))
        .collect();
    if finished.len() <= MAX_FINISHED_BATCHES {
        return;
    }
    finished.sort();
    let excess = finished.len() - MAX_FINISHED_BATCHES;
    for (_, id) in finished.into_iter().take(excess) {
        batches.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use colorbook_core::job::{Backend, PollOutcome, ProviderTask};
    use colorbook_providers::{ProviderError, Submission, TaskProvider};

    use super::*;
    use crate::config::PollingConfig;

    /// Accepts every submission and reports it in progress forever.
    struct EndlessProvider;

    #[async_trait]
    impl TaskProvider for EndlessProvider {
        async fn submit(
            &self,
            _job_type: JobType,
            _params: &JobParams,
        ) -> Result<Submission, ProviderError> {
            Ok(Submission::Accepted(ProviderTask {
                backend: Backend::Gpt4oImage,
                task_id: "task-1".into(),
            }))
        }

        async fn query(
            &self,
            _job_type: JobType,
            _task: &ProviderTask,
        ) -> Result<PollOutcome, ProviderError> {
            Ok(PollOutcome::in_progress(None))
        }
    }

    fn view(status: JobState, progress: u8) -> StatusView {
        StatusView {
            status,
            progress,
            busy: !status.is_terminal(),
            message: None,
        }
    }

    #[test]
    fn recount_splits_success_and_failure() {
        let mut status = BatchStatus {
            batch_id: Uuid::new_v4(),
            job_type: JobType::Colorization,
            total_count: 3,
            completed_count: 0,
            succeeded_count: 0,
            failed_count: 0,
            done: false,
            cancelled: false,
            per_subject: BTreeMap::new(),
            created_at: chrono::Utc::now(),
        };
        let now = chrono::Utc::now();
        for (key, state) in [
            ("a", JobState::Completed),
            ("b", JobState::TimedOut),
            ("c", JobState::Polling),
        ] {
            let mut s = SubjectStatus::pending();
            s.observe(Uuid::new_v4(), view(state, 10), now);
            status.per_subject.insert(key.into(), s);
        }

        status.recount();
        assert_eq!(status.completed_count, 2);
        assert_eq!(status.succeeded_count, 1);
        assert_eq!(status.failed_count, 1);
        assert!(!status.done);
    }

    #[test]
    fn terminal_subjects_ignore_later_observations() {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        let mut s = SubjectStatus::pending();
        s.observe(id, view(JobState::Failed, 0), now);
        s.observe(id, view(JobState::Polling, 50), now + chrono::Duration::seconds(1));
        assert_eq!(s.status, JobState::Failed);
    }

    #[test]
    fn stale_observations_are_ignored() {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        let mut s = SubjectStatus::pending();
        s.observe(id, view(JobState::Polling, 40), now);
        s.observe(id, view(JobState::Created, 0), now - chrono::Duration::seconds(1));
        assert_eq!(s.status, JobState::Polling);
        assert_eq!(s.progress, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_a_start_is_pending_stops_the_late_job() {
        let config = PollingConfig {
            initial_delay: Duration::from_millis(100),
            interval: Duration::from_millis(100),
            ..PollingConfig::default()
        };
        let registry = JobRegistry::new(Arc::new(EndlessProvider), config);
        let batches = BatchCoordinator::new(Arc::clone(&registry));

        let guard = registry.hold_lock().await;
        let started = batches
            .start_batch(
                JobType::Colorization,
                vec![BatchItem {
                    subject_key: "item-1".into(),
                    params: JobParams {
                        image_url: Some("https://cdn.example.com/a.png".into()),
                        ..Default::default()
                    },
                }],
                JobParams::default(),
            )
            .await
            .unwrap();
        // Let the starter reach the registry lock.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let cancelled = batches.cancel(started.batch_id).await.unwrap();
        assert_eq!(cancelled.per_subject["item-1"].status, JobState::Cancelled);
        drop(guard);

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(!registry.is_busy("item-1", JobType::Colorization).await);
        let status = batches.status(started.batch_id).await.unwrap();
        let subject = &status.per_subject["item-1"];
        assert_eq!(subject.status, JobState::Cancelled);
        let job_id = subject.job_id.expect("late job is tracked");
        let job = registry.get_by_id(job_id).await.unwrap();
        assert_eq!(job.state, JobState::Cancelled);
        assert!(status.done);
    }
}
