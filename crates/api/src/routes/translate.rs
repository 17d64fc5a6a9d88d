use axum::routing::post;
use axum::Router;

use crate::handlers::translate;
use crate::state::AppState;

/// Mounted at `/translate`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(translate::translate))
}
