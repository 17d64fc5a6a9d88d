//! Job model and state machine for asynchronous AI provider work.
//!
//! A [`Job`] tracks one unit of work against an external provider for a
//! single `(subject_key, job_type)` pair. Transitions are pure methods on
//! the job; the pipeline crate decides *when* to call them.
//!
//! ```text
//! Created --accepted--> Polling --succeeded+payload--> Completed
//!    |                    |  \--failed / retries exhausted--> Failed
//!    |                    |  \--attempts exhausted---------> TimedOut
//!    |                    \--cancel / supersede------------> Cancelled
//!    \--rejected----------------------------------------------> Failed
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Error recorded when a provider reports success without a usable payload.
pub const MALFORMED_RESPONSE: &str = "malformed provider response";

/// Reason recorded on a job replaced by a newer one for the same key.
pub const SUPERSEDED: &str = "superseded by a newer job";

/// Reason recorded on an explicit user cancellation.
pub const CANCELLED_BY_USER: &str = "cancelled by user";

/// Fallback error when a provider reports failure without a message.
const PROVIDER_FAILED: &str = "provider reported failure";

// ---------------------------------------------------------------------------
// Job type
// ---------------------------------------------------------------------------

/// Kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    ThemeGeneration,
    ContentGeneration,
    Translation,
    TextToImage,
    ImageToImage,
    Colorization,
}

/// Shape of the payload a job type must produce to count as completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Url,
    Text,
}

impl JobType {
    pub const ALL: [JobType; 6] = [
        JobType::ThemeGeneration,
        JobType::ContentGeneration,
        JobType::Translation,
        JobType::TextToImage,
        JobType::ImageToImage,
        JobType::Colorization,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThemeGeneration => "theme-generation",
            Self::ContentGeneration => "content-generation",
            Self::Translation => "translation",
            Self::TextToImage => "text-to-image",
            Self::ImageToImage => "image-to-image",
            Self::Colorization => "colorization",
        }
    }

    pub fn expected_result(self) -> ResultKind {
        match self {
            Self::ThemeGeneration | Self::ContentGeneration | Self::Translation => ResultKind::Text,
            Self::TextToImage | Self::ImageToImage | Self::Colorization => ResultKind::Url,
        }
    }

    /// Image jobs go to an image backend, the rest to the text model.
    pub fn is_image(self) -> bool {
        self.expected_result() == ResultKind::Url
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown job type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Job state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Polling,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Polling => "polling",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Keys, provider handles, outcomes
// ---------------------------------------------------------------------------

/// Registry key: one subject may run several job types at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub subject_key: String,
    pub job_type: JobType,
}

impl JobKey {
    pub fn new(subject_key: impl Into<String>, job_type: JobType) -> Self {
        Self {
            subject_key: subject_key.into(),
            job_type,
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject_key, self.job_type)
    }
}

/// Which external backend owns a provider task id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    Gpt4oImage,
    FluxKontext,
    Text,
}

/// Opaque handle returned by a provider once it accepts a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTask {
    pub backend: Backend,
    pub task_id: String,
}

/// Payload of a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobResult {
    Url { url: String },
    Text { text: String },
}

impl JobResult {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// True if this payload is non-empty and of the requested kind.
    pub fn satisfies(&self, kind: ResultKind) -> bool {
        match (self, kind) {
            (Self::Url { url }, ResultKind::Url) => !url.trim().is_empty(),
            (Self::Text { text }, ResultKind::Text) => !text.trim().is_empty(),
            _ => false,
        }
    }
}

/// Provider status vocabulary after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    InProgress,
    Succeeded,
    Failed,
}

/// One normalized provider status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOutcome {
    pub status: PollStatus,
    /// Raw progress as the provider reported it (fraction or percent).
    pub progress: Option<f64>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl PollOutcome {
    pub fn in_progress(progress: Option<f64>) -> Self {
        Self {
            status: PollStatus::InProgress,
            progress,
            result: None,
            error: None,
        }
    }

    pub fn succeeded(result: Option<JobResult>) -> Self {
        Self {
            status: PollStatus::Succeeded,
            progress: None,
            result,
            error: None,
        }
    }

    pub fn failed(error: Option<String>) -> Self {
        Self {
            status: PollStatus::Failed,
            progress: None,
            result: None,
            error,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Normalize a provider progress value to an integer percentage.
///
/// Values `<= 1` are treated as fractions (so `1.0` means 100%), larger
/// values as percentages. The result is clamped to `0..=100`. Non-finite
/// values yield `None`.
pub fn normalize_progress(raw: f64) -> Option<u8> {
    if !raw.is_finite() {
        return None;
    }
    let pct = if raw <= 1.0 { raw * 100.0 } else { raw };
    Some(pct.round().clamp(0.0, 100.0) as u8)
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("job is already terminal ({0})")]
    Terminal(JobState),

    #[error("transition not allowed from {0}")]
    NotAllowed(JobState),
}

/// One in-flight (or recently finished) unit of provider work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub key: JobKey,
    pub state: JobState,
    pub progress: u8,
    pub provider_task: Option<ProviderTask>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    /// Status queries issued so far.
    pub attempts: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// What the view layer renders for a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub status: JobState,
    pub progress: u8,
    pub busy: bool,
    pub message: Option<String>,
}

impl Job {
    pub fn new(key: JobKey) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            key,
            state: JobState::Created,
            progress: 0,
            provider_task: None,
            result: None,
            error: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// `Created -> Polling` once the provider accepted the task.
    pub fn begin_polling(&mut self, task: ProviderTask) -> Result<(), TransitionError> {
        match self.state {
            JobState::Created => {
                self.provider_task = Some(task);
                self.set_state(JobState::Polling);
                Ok(())
            }
            s if s.is_terminal() => Err(TransitionError::Terminal(s)),
            s => Err(TransitionError::NotAllowed(s)),
        }
    }

    /// Count one status query against the attempt budget.
    pub fn record_attempt(&mut self) -> Result<u32, TransitionError> {
        self.ensure_state(JobState::Polling)?;
        self.attempts += 1;
        self.touch();
        Ok(self.attempts)
    }

    /// Apply a normalized poll response. Returns the resulting state.
    ///
    /// Success without a payload of the expected kind becomes `Failed`
    /// with [`MALFORMED_RESPONSE`].
    pub fn apply_outcome(&mut self, outcome: PollOutcome) -> Result<JobState, TransitionError> {
        self.ensure_state(JobState::Polling)?;

        match outcome.status {
            PollStatus::InProgress => {
                if let Some(pct) = outcome.progress.and_then(normalize_progress) {
                    self.progress = self.progress.max(pct);
                }
                self.touch();
            }
            PollStatus::Succeeded => {
                let kind = self.key.job_type.expected_result();
                match outcome.result {
                    Some(result) if result.satisfies(kind) => {
                        self.result = Some(result);
                        self.progress = 100;
                        self.set_state(JobState::Completed);
                    }
                    _ => {
                        self.error = Some(format!(
                            "{MALFORMED_RESPONSE}: success without {} result",
                            match kind {
                                ResultKind::Url => "url",
                                ResultKind::Text => "text",
                            }
                        ));
                        self.set_state(JobState::Failed);
                    }
                }
            }
            PollStatus::Failed => {
                self.error = Some(
                    outcome
                        .error
                        .filter(|e| !e.trim().is_empty())
                        .unwrap_or_else(|| PROVIDER_FAILED.to_string()),
                );
                self.set_state(JobState::Failed);
            }
        }

        Ok(self.state)
    }

    /// Any non-terminal state -> `Failed`.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_live()?;
        self.error = Some(reason.into());
        self.set_state(JobState::Failed);
        Ok(())
    }

    /// Any non-terminal state -> `Cancelled`.
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_live()?;
        self.error = Some(reason.into());
        self.set_state(JobState::Cancelled);
        Ok(())
    }

    /// `Polling -> TimedOut` once `max_attempts` queries went unanswered.
    pub fn time_out(&mut self, max_attempts: u32) -> Result<(), TransitionError> {
        self.ensure_state(JobState::Polling)?;
        self.error = Some(format!(
            "no terminal status after {max_attempts} status checks"
        ));
        self.set_state(JobState::TimedOut);
        Ok(())
    }

    /// Project the job into the shape the UI renders.
    pub fn status_view(&self) -> StatusView {
        let message = match (&self.state, &self.result) {
            (JobState::Completed, Some(JobResult::Url { url })) => Some(url.clone()),
            (JobState::Completed, Some(JobResult::Text { .. })) => Some("completed".to_string()),
            (JobState::Created, _) => Some("submitting".to_string()),
            (JobState::Polling, _) => Some(format!("{}%", self.progress)),
            _ => self.error.clone(),
        };
        StatusView {
            status: self.state,
            progress: self.progress,
            busy: !self.is_terminal(),
            message,
        }
    }

    // ---- private helpers ----

    fn ensure_state(&self, expected: JobState) -> Result<(), TransitionError> {
        if self.state == expected {
            Ok(())
        } else if self.state.is_terminal() {
            Err(TransitionError::Terminal(self.state))
        } else {
            Err(TransitionError::NotAllowed(self.state))
        }
    }

    fn ensure_live(&self) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            Err(TransitionError::Terminal(self.state))
        } else {
            Ok(())
        }
    }

    fn set_state(&mut self, state: JobState) {
        self.state = state;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now();
    }
}
