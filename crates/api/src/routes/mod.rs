pub mod assets;
pub mod batches;
pub mod categories;
pub mod content;
pub mod health;
pub mod jobs;
pub mod tags;
pub mod translate;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                                     list active, start (POST)
/// /jobs/{subject_key}                       jobs for one subject
/// /jobs/{subject_key}/{job_type}            get, cancel (DELETE)
/// /jobs/{subject_key}/{job_type}/busy       busy flag
///
/// /batches                                  list, start (POST)
/// /batches/{id}                             status, cancel (DELETE)
///
/// /translate                                bulk translation (POST)
///
/// /assets                                   multipart upload (POST)
/// /assets/import                            copy a remote image (POST)
///
/// /content                                  list, create
/// /content/{id}                             get, update, delete
/// /content/{id}/tags                        replace tag set (PUT)
///
/// /categories                               list, create
/// /categories/{id}                          get, update, delete
///
/// /tags                                     list, create
/// /tags/{id}                                get, update, delete
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/batches", batches::router())
        .nest("/translate", translate::router())
        .nest("/assets", assets::router())
        .nest("/content", content::router())
        .nest("/categories", categories::router())
        .nest("/tags", tags::router())
}
