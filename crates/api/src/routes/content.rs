//! Route definitions for content items.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::content;
use crate::state::AppState;

/// Content routes mounted at `/content`.
///
/// ```text
/// GET    /            -> list_content
/// POST   /            -> create_content
/// GET    /{id}        -> get_content
/// PUT    /{id}        -> update_content
/// DELETE /{id}        -> delete_content
/// PUT    /{id}/tags   -> set_content_tags
/// POST   /{id}/translate -> translate_content
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(content::list_content).post(content::create_content))
        .route(
            "/{id}",
            get(content::get_content)
                .put(content::update_content)
                .delete(content::delete_content),
        )
        .route("/{id}/tags", put(content::set_content_tags))
        .route("/{id}/translate", post(content::translate_content))
}
