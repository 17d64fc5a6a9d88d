//! Handlers for content tags.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use colorbook_core::error::CoreError;
use colorbook_core::types::DbId;
use colorbook_db::models::tag::{CreateTag, UpdateTag};
use colorbook_db::repositories::TagRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/tags
pub async fn list_tags(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let tags = TagRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: tags }))
}

/// POST /api/v1/tags
pub async fn create_tag(
    State(state): State<AppState>,
    Json(input): Json<CreateTag>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let tag = TagRepo::create(&state.pool, &input).await?;
    tracing::info!(tag_id = tag.id, slug = %tag.slug, "Tag created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: tag })))
}

/// GET /api/v1/tags/{id}
pub async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let tag = TagRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(not_found(id))?;
    Ok(Json(DataResponse { data: tag }))
}

/// PUT /api/v1/tags/{id}
pub async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateTag>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let tag = TagRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(not_found(id))?;
    Ok(Json(DataResponse { data: tag }))
}

/// DELETE /api/v1/tags/{id}
///
/// Removes the tag from every item carrying it.
pub async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !TagRepo::delete(&state.pool, id).await? {
        return Err(not_found(id));
    }
    tracing::info!(tag_id = id, "Tag deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity: "Tag", id })
}
