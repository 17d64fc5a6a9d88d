//! Handlers for AI jobs.
//!
//! Jobs live in memory in the [`JobRegistry`](colorbook_pipeline::JobRegistry)
//! and are addressed by `(subject_key, job_type)`. Starting a job for a key
//! that already has one running supersedes the old job.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use colorbook_core::job::{Job, JobType, StatusView};
use colorbook_core::params::JobParams;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartJobRequest {
    pub subject_key: String,
    pub job_type: JobType,
    #[serde(default)]
    pub params: JobParams,
}

/// A job together with the view the admin UI renders for it.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    #[serde(flatten)]
    pub job: Job,
    pub view: StatusView,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        let view = job.status_view();
        Self { job, view }
    }
}

#[derive(Debug, Serialize)]
pub struct BusyResponse {
    pub busy: bool,
}

/// POST /api/v1/jobs
///
/// Start a job. Parameters are validated before anything is submitted.
pub async fn start_job(
    State(state): State<AppState>,
    Json(input): Json<StartJobRequest>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .jobs
        .start(&input.subject_key, input.job_type, input.params)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: JobResponse::from(job),
        }),
    ))
}

/// GET /api/v1/jobs
///
/// All non-terminal jobs, oldest first.
pub async fn list_active(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs: Vec<JobResponse> = state
        .jobs
        .list_active()
        .await
        .into_iter()
        .map(JobResponse::from)
        .collect();

    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{subject_key}
pub async fn list_subject(
    State(state): State<AppState>,
    Path(subject_key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let jobs: Vec<JobResponse> = state
        .jobs
        .list_subject(&subject_key)
        .await
        .into_iter()
        .map(JobResponse::from)
        .collect();

    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{subject_key}/{job_type}
pub async fn get_job(
    State(state): State<AppState>,
    Path((subject_key, job_type)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let job_type: JobType = job_type.parse()?;
    let job = state
        .jobs
        .get(&subject_key, job_type)
        .await
        .ok_or_else(|| no_job(&subject_key, job_type))?;

    Ok(Json(DataResponse {
        data: JobResponse::from(job),
    }))
}

/// DELETE /api/v1/jobs/{subject_key}/{job_type}
///
/// Cancel the job. The provider task is abandoned, not cancelled remotely.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path((subject_key, job_type)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let job_type: JobType = job_type.parse()?;
    let job = state
        .jobs
        .cancel(&subject_key, job_type)
        .await
        .ok_or_else(|| no_job(&subject_key, job_type))?;

    Ok(Json(DataResponse {
        data: JobResponse::from(job),
    }))
}

/// GET /api/v1/jobs/{subject_key}/{job_type}/busy
pub async fn is_busy(
    State(state): State<AppState>,
    Path((subject_key, job_type)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let job_type: JobType = job_type.parse()?;
    let busy = state.jobs.is_busy(&subject_key, job_type).await;

    Ok(Json(DataResponse {
        data: BusyResponse { busy },
    }))
}

fn no_job(subject_key: &str, job_type: JobType) -> AppError {
    AppError::NotFound(format!("No {job_type} job for '{subject_key}'"))
}
