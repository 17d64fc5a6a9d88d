//! Polling cadence, retry budget and retention settings.

use std::collections::HashMap;
use std::time::Duration;

use colorbook_core::job::JobType;

/// Tunable parameters for job polling and batch pacing.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Delay between submission and the first status query.
    pub initial_delay: Duration,
    /// Delay between two status queries.
    pub interval: Duration,
    /// Consecutive transport errors tolerated before a job fails.
    pub retry_budget: u32,
    /// How long a terminal job stays visible under its key.
    pub grace_period: Duration,
    /// Delay between two job starts of the same batch.
    pub batch_start_spacing: Duration,
    /// Per-type attempt ceilings overriding [`default_max_attempts`].
    pub max_attempts_overrides: HashMap<JobType, u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            interval: Duration::from_secs(3),
            retry_budget: 3,
            grace_period: Duration::from_secs(5),
            batch_start_spacing: Duration::from_secs(1),
            max_attempts_overrides: HashMap::new(),
        }
    }
}

/// Attempt ceiling per job type at the default 3 s interval.
///
/// Colorization routinely takes the longest upstream.
pub fn default_max_attempts(job_type: JobType) -> u32 {
    match job_type {
        JobType::ThemeGeneration | JobType::ContentGeneration | JobType::Translation => 40,
        JobType::TextToImage | JobType::ImageToImage => 120,
        JobType::Colorization => 150,
    }
}

impl PollingConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `POLL_INITIAL_DELAY_MS`  | `2000`  |
    /// | `POLL_INTERVAL_MS`       | `3000`  |
    /// | `POLL_RETRY_BUDGET`      | `3`     |
    /// | `JOB_GRACE_PERIOD_MS`    | `5000`  |
    /// | `BATCH_START_SPACING_MS` | `1000`  |
    pub fn from_env() -> Self {
        Self {
            initial_delay: env_millis("POLL_INITIAL_DELAY_MS", 2000),
            interval: env_millis("POLL_INTERVAL_MS", 3000),
            retry_budget: std::env::var("POLL_RETRY_BUDGET")
                .unwrap_or_else(|_| "3".into())
                .parse()
                .expect("POLL_RETRY_BUDGET must be a valid u32"),
            grace_period: env_millis("JOB_GRACE_PERIOD_MS", 5000),
            batch_start_spacing: env_millis("BATCH_START_SPACING_MS", 1000),
            max_attempts_overrides: HashMap::new(),
        }
    }

    pub fn max_attempts(&self, job_type: JobType) -> u32 {
        self.max_attempts_overrides
            .get(&job_type)
            .copied()
            .unwrap_or_else(|| default_max_attempts(job_type))
    }

    /// Override the attempt ceiling of one job type.
    pub fn with_max_attempts(mut self, job_type: JobType, attempts: u32) -> Self {
        self.max_attempts_overrides.insert(job_type, attempts);
        self
    }
}

fn env_millis(var: &str, default: u64) -> Duration {
    let millis: u64 = match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{var} must be a valid number of milliseconds")),
        Err(_) => default,
    };
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upstream_cadence() {
        let config = PollingConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(2));
        assert_eq!(config.interval, Duration::from_secs(3));
        assert_eq!(config.retry_budget, 3);
        assert_eq!(config.grace_period, Duration::from_secs(5));
    }

    #[test]
    fn image_jobs_get_longer_ceilings() {
        let config = PollingConfig::default();
        assert_eq!(config.max_attempts(JobType::Translation), 40);
        assert_eq!(config.max_attempts(JobType::TextToImage), 120);
        assert_eq!(config.max_attempts(JobType::Colorization), 150);
    }

    #[test]
    fn overrides_apply_per_type() {
        let config = PollingConfig::default().with_max_attempts(JobType::Colorization, 2);
        assert_eq!(config.max_attempts(JobType::Colorization), 2);
        assert_eq!(config.max_attempts(JobType::ImageToImage), 120);
    }
}
