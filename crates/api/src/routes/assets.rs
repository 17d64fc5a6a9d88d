//! Route definitions for image assets.

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;
use colorbook_core::assets::MAX_UPLOAD_BYTES;

use crate::handlers::assets;
use crate::state::AppState;

/// Headroom for multipart framing around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Asset routes mounted at `/assets`.
///
/// ```text
/// POST /          -> upload_asset (multipart: file, folder)
/// POST /import    -> import_asset
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(assets::upload_asset))
        .route("/import", post(assets::import_asset))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD))
}
