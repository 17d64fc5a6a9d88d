#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use colorbook_core::job::{
    Backend, Job, JobResult, JobType, PollOutcome, ProviderTask,
};
use colorbook_core::params::JobParams;
use colorbook_pipeline::{JobRegistry, PollingConfig};
use colorbook_providers::{ProviderError, Submission, TaskProvider};

/// How the mock answers one submission.
pub enum SubmitStep {
    Accept,
    Reject(&'static str),
    Finish(PollOutcome),
}

/// How the mock answers one status query.
pub enum QueryStep {
    Outcome(PollOutcome),
    /// Retryable upstream failure (HTTP 503).
    Unavailable,
    /// Answer only after `delay`.
    Delayed(Duration, PollOutcome),
}

/// Scripted in-memory provider.
///
/// Accepted tasks are numbered `task-1`, `task-2`, ... in submission
/// order. Each task answers from its own script, then reports
/// "in progress" forever.
#[derive(Default)]
pub struct MockProvider {
    submits: Mutex<VecDeque<SubmitStep>>,
    /// Submission steps keyed by prompt, taking precedence over `submits`.
    submits_by_prompt: Mutex<HashMap<String, SubmitStep>>,
    scripts: Mutex<HashMap<String, VecDeque<QueryStep>>>,
    next_task: AtomicU32,
    pub queries: AtomicU32,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_submit(&self, step: SubmitStep) -> &Self {
        self.submits.lock().unwrap().push_back(step);
        self
    }

    pub fn on_submit_prompt(&self, prompt: &str, step: SubmitStep) -> &Self {
        self.submits_by_prompt
            .lock()
            .unwrap()
            .insert(prompt.to_string(), step);
        self
    }

    pub fn script(&self, task_id: &str, steps: Vec<QueryStep>) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(task_id.to_string(), steps.into());
        self
    }

    pub fn query_count(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskProvider for MockProvider {
    async fn submit(
        &self,
        _job_type: JobType,
        params: &JobParams,
    ) -> Result<Submission, ProviderError> {
        let by_prompt = params
            .prompt
            .as_ref()
            .and_then(|p| self.submits_by_prompt.lock().unwrap().remove(p));
        let step = by_prompt
            .or_else(|| self.submits.lock().unwrap().pop_front())
            .unwrap_or(SubmitStep::Accept);

        match step {
            SubmitStep::Accept => {
                let n = self.next_task.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Submission::Accepted(ProviderTask {
                    backend: Backend::Gpt4oImage,
                    task_id: format!("task-{n}"),
                }))
            }
            SubmitStep::Reject(message) => Err(ProviderError::Rejected {
                status: 400,
                message: message.to_string(),
            }),
            SubmitStep::Finish(outcome) => Ok(Submission::Finished(outcome)),
        }
    }

    async fn query(
        &self,
        _job_type: JobType,
        task: &ProviderTask,
    ) -> Result<PollOutcome, ProviderError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&task.task_id)
            .and_then(|s| s.pop_front());

        match step {
            None => Ok(PollOutcome::in_progress(None)),
            Some(QueryStep::Outcome(outcome)) => Ok(outcome),
            Some(QueryStep::Unavailable) => Err(ProviderError::Rejected {
                status: 503,
                message: "service unavailable".into(),
            }),
            Some(QueryStep::Delayed(delay, outcome)) => {
                tokio::time::sleep(delay).await;
                Ok(outcome)
            }
        }
    }
}

pub fn progress(fraction: f64) -> QueryStep {
    QueryStep::Outcome(PollOutcome::in_progress(Some(fraction)))
}

pub fn success_url(url: &str) -> QueryStep {
    QueryStep::Outcome(PollOutcome::succeeded(Some(JobResult::url(url))))
}

/// Fast cadence for tests running on paused time.
pub fn test_config() -> PollingConfig {
    PollingConfig {
        initial_delay: Duration::from_millis(100),
        interval: Duration::from_millis(100),
        retry_budget: 3,
        grace_period: Duration::from_secs(5),
        batch_start_spacing: Duration::from_millis(50),
        ..PollingConfig::default()
    }
}

pub fn registry(provider: Arc<MockProvider>, config: PollingConfig) -> Arc<JobRegistry> {
    JobRegistry::new(provider, config)
}

pub fn colorize_params() -> JobParams {
    JobParams {
        image_url: Some("https://cdn.example.com/line-art.png".into()),
        ..Default::default()
    }
}

/// Poll `registry` until the job under `key` is terminal.
pub async fn wait_terminal(registry: &JobRegistry, subject_key: &str, job_type: JobType) -> Job {
    for _ in 0..10_000 {
        if let Some(job) = registry.get(subject_key, job_type).await {
            if job.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {subject_key}/{job_type} never reached a terminal state");
}
