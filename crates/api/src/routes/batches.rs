//! Route definitions for batch operations.

use axum::routing::get;
use axum::Router;

use crate::handlers::batches;
use crate::state::AppState;

/// Batch routes mounted at `/batches`.
///
/// ```text
/// GET    /       -> list_batches
/// POST   /       -> start_batch
/// GET    /{id}   -> get_batch
/// DELETE /{id}   -> cancel_batch
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(batches::list_batches).post(batches::start_batch))
        .route(
            "/{id}",
            get(batches::get_batch).delete(batches::cancel_batch),
        )
}
