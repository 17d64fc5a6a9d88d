//! Route definitions for AI jobs.

use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Job routes mounted at `/jobs`.
///
/// ```text
/// GET    /                               -> list_active
/// POST   /                               -> start_job
/// GET    /{subject_key}                  -> list_subject
/// GET    /{subject_key}/{job_type}       -> get_job
/// DELETE /{subject_key}/{job_type}       -> cancel_job
/// GET    /{subject_key}/{job_type}/busy  -> is_busy
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_active).post(jobs::start_job))
        .route("/{subject_key}", get(jobs::list_subject))
        .route(
            "/{subject_key}/{job_type}",
            get(jobs::get_job).delete(jobs::cancel_job),
        )
        .route("/{subject_key}/{job_type}/busy", get(jobs::is_busy))
}
