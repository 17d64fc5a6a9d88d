mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use colorbook_core::error::CoreError;
use colorbook_core::job::{
    JobResult, JobState, JobType, PollOutcome, CANCELLED_BY_USER, MALFORMED_RESPONSE, SUPERSEDED,
};
use colorbook_core::params::JobParams;

use common::*;

// -- happy path ---------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn progress_then_completion_with_url() {
    let provider = MockProvider::new();
    provider.script(
        "task-1",
        vec![
            progress(0.2),
            progress(0.5),
            success_url("https://cdn.example.com/colored.png"),
        ],
    );
    let registry = registry(provider.clone(), test_config());
    let mut events = registry.subscribe();

    let started = registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();
    assert_eq!(started.state, JobState::Created);

    let job = wait_terminal(&registry, "item-1", JobType::Colorization).await;
    assert_eq!(job.id, started.id);
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(
        job.result,
        Some(JobResult::url("https://cdn.example.com/colored.png"))
    );
    assert_eq!(job.attempts, 3);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push((event.view.status, event.view.progress));
    }
    assert_eq!(
        seen,
        vec![
            (JobState::Created, 0),
            (JobState::Polling, 0),
            (JobState::Polling, 20),
            (JobState::Polling, 50),
            (JobState::Completed, 100),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn progress_never_decreases() {
    let provider = MockProvider::new();
    provider.script(
        "task-1",
        vec![
            progress(0.6),
            progress(0.3),
            progress(45.0),
            success_url("https://x/y.png"),
        ],
    );
    let registry = registry(provider, test_config());
    let mut events = registry.subscribe();

    registry
        .start("item-1", JobType::TextToImage, JobParams {
            prompt: Some("a lighthouse".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    wait_terminal(&registry, "item-1", JobType::TextToImage).await;

    let mut last = 0;
    while let Ok(event) = events.try_recv() {
        assert!(event.view.progress >= last, "progress went backwards");
        last = event.view.progress;
    }
    assert_eq!(last, 100);
}

#[tokio::test(start_paused = true)]
async fn inline_text_result_passes_through_polling() {
    let provider = MockProvider::new();
    provider.on_submit(SubmitStep::Finish(PollOutcome::succeeded(Some(
        JobResult::text(r#"{"themes":[]}"#),
    ))));
    let registry = registry(provider.clone(), test_config());
    let mut events = registry.subscribe();

    registry
        .start("kw-1", JobType::ThemeGeneration, JobParams {
            prompt: Some("space".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let job = wait_terminal(&registry, "kw-1", JobType::ThemeGeneration).await;
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.result, Some(JobResult::text(r#"{"themes":[]}"#)));
    assert_eq!(provider.query_count(), 0);

    let states: Vec<JobState> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|e| e.view.status)
        .collect();
    assert_eq!(
        states,
        vec![JobState::Created, JobState::Polling, JobState::Completed]
    );
}

// -- failures -----------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn success_without_result_is_malformed() {
    let provider = MockProvider::new();
    provider.script(
        "task-1",
        vec![QueryStep::Outcome(PollOutcome::succeeded(None))],
    );
    let registry = registry(provider, test_config());

    registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();

    let job = wait_terminal(&registry, "item-1", JobType::Colorization).await;
    assert_eq!(job.state, JobState::Failed);
    assert!(job.result.is_none());
    assert!(job.error.as_deref().unwrap().contains(MALFORMED_RESPONSE));
}

#[tokio::test(start_paused = true)]
async fn rejected_submission_fails_without_task() {
    let provider = MockProvider::new();
    provider.on_submit(SubmitStep::Reject("insufficient credits"));
    let registry = registry(provider.clone(), test_config());

    registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();

    let job = wait_terminal(&registry, "item-1", JobType::Colorization).await;
    assert_eq!(job.state, JobState::Failed);
    assert!(job.provider_task.is_none());
    assert!(job.error.as_deref().unwrap().contains("insufficient credits"));
    assert_eq!(provider.query_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_errors_within_budget_are_retried() {
    let provider = MockProvider::new();
    provider.script(
        "task-1",
        vec![
            QueryStep::Unavailable,
            QueryStep::Unavailable,
            QueryStep::Unavailable,
            success_url("https://x/y.png"),
        ],
    );
    let registry = registry(provider, test_config());

    registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();

    let job = wait_terminal(&registry, "item-1", JobType::Colorization).await;
    assert_eq!(job.state, JobState::Completed);
}

#[tokio::test(start_paused = true)]
async fn transient_errors_beyond_budget_fail() {
    let provider = MockProvider::new();
    provider.script("task-1", (0..4).map(|_| QueryStep::Unavailable).collect());
    let registry = registry(provider.clone(), test_config());

    registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();

    let job = wait_terminal(&registry, "item-1", JobType::Colorization).await;
    assert_eq!(job.state, JobState::Failed);
    assert!(job.error.as_deref().unwrap().contains("4 consecutive errors"));
    assert_eq!(provider.query_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn attempt_ceiling_times_out() {
    let provider = MockProvider::new();
    let config = test_config().with_max_attempts(JobType::Colorization, 3);
    let registry = registry(provider.clone(), config);

    registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();

    let job = wait_terminal(&registry, "item-1", JobType::Colorization).await;
    assert_eq!(job.state, JobState::TimedOut);
    assert_eq!(job.attempts, 3);
    assert_eq!(provider.query_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn invalid_params_create_no_job() {
    let provider = MockProvider::new();
    let registry = registry(provider, test_config());

    let err = registry
        .start("item-1", JobType::Colorization, JobParams::default())
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Validation(_));
    assert!(registry.get("item-1", JobType::Colorization).await.is_none());

    let err = registry
        .start("  ", JobType::Colorization, colorize_params())
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Validation(_));
}

// -- supersession, staleness, cancellation ------------------------------------

#[tokio::test(start_paused = true)]
async fn second_start_supersedes_first() {
    let provider = MockProvider::new();
    let registry = registry(provider, test_config());

    let first = registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    let second = registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();

    let active = registry.list_active().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);
    assert!(registry.is_busy("item-1", JobType::Colorization).await);

    let first = registry.get_by_id(first.id).await.unwrap();
    assert_eq!(first.state, JobState::Cancelled);
    assert_eq!(first.error.as_deref(), Some(SUPERSEDED));
}

#[tokio::test(start_paused = true)]
async fn late_response_for_superseded_job_is_discarded() {
    let provider = MockProvider::new();
    provider
        .script(
            "task-1",
            vec![QueryStep::Delayed(
                Duration::from_secs(10),
                PollOutcome::succeeded(Some(JobResult::url("https://x/old.png"))),
            )],
        )
        .script("task-2", vec![success_url("https://x/new.png")]);
    let registry = registry(provider.clone(), test_config());

    let first = registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();
    // Let the first job reach its slow status query.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(provider.query_count(), 1);

    let second = registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();
    let done = wait_terminal(&registry, "item-1", JobType::Colorization).await;
    assert_eq!(done.id, second.id);

    // Well past the point where the first response would have arrived.
    tokio::time::sleep(Duration::from_secs(15)).await;

    let first = registry.get_by_id(first.id).await.unwrap();
    assert_eq!(first.state, JobState::Cancelled);
    assert!(first.result.is_none());

    let second = registry.get_by_id(second.id).await.unwrap();
    assert_eq!(second.result, Some(JobResult::url("https://x/new.png")));
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_polling() {
    let provider = MockProvider::new();
    let registry = registry(provider.clone(), test_config());

    registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;

    let job = registry
        .cancel("item-1", JobType::Colorization)
        .await
        .unwrap();
    assert_eq!(job.state, JobState::Cancelled);
    assert_eq!(job.error.as_deref(), Some(CANCELLED_BY_USER));
    assert!(!registry.is_busy("item-1", JobType::Colorization).await);

    let queries = provider.query_count();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(provider.query_count(), queries);

    // Cancelling a finished job is a no-op.
    let again = registry
        .cancel("item-1", JobType::Colorization)
        .await
        .unwrap();
    assert_eq!(again.state, JobState::Cancelled);
    assert!(registry.cancel("nobody", JobType::Colorization).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn terminal_jobs_retire_after_grace_period() {
    let provider = MockProvider::new();
    provider.script("task-1", vec![success_url("https://x/y.png")]);
    let registry = registry(provider, test_config());

    let started = registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();
    wait_terminal(&registry, "item-1", JobType::Colorization).await;
    assert_eq!(registry.list_subject("item-1").await.len(), 1);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(registry.get("item-1", JobType::Colorization).await.is_none());
    assert!(registry.list_subject("item-1").await.is_empty());

    let retired = registry.get_by_id(started.id).await.unwrap();
    assert_eq!(retired.state, JobState::Completed);
}

#[tokio::test(start_paused = true)]
async fn jobs_for_one_subject_run_side_by_side() {
    let provider = MockProvider::new();
    let registry = registry(provider, test_config());

    registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();
    registry
        .start("item-1", JobType::ImageToImage, colorize_params())
        .await
        .unwrap();

    let jobs = registry.list_subject("item-1").await;
    let types: Vec<JobType> = jobs.iter().map(|j| j.key.job_type).collect();
    assert_eq!(types, vec![JobType::ImageToImage, JobType::Colorization]);
    assert!(jobs.iter().all(|j| !j.is_terminal()));
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_running_jobs() {
    let provider = MockProvider::new();
    let registry = registry(provider, test_config());

    let job = registry
        .start("item-1", JobType::Colorization, colorize_params())
        .await
        .unwrap();
    registry.shutdown().await;

    let job = registry.get_by_id(job.id).await.unwrap();
    assert_eq!(job.state, JobState::Cancelled);
    assert_matches!(
        registry
            .start("item-2", JobType::Colorization, colorize_params())
            .await,
        Err(CoreError::Conflict(_))
    );
}
