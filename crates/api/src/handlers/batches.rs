//! Handlers for batch operations.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use colorbook_core::job::JobType;
use colorbook_core::params::JobParams;
use colorbook_pipeline::BatchItem;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartBatchRequest {
    pub job_type: JobType,
    pub items: Vec<BatchItem>,
    /// Parameters applied to every item unless the item overrides them.
    #[serde(default)]
    pub shared: JobParams,
}

/// POST /api/v1/batches
///
/// Items are started in the background with a fixed spacing. A failing
/// item never stops the others.
pub async fn start_batch(
    State(state): State<AppState>,
    Json(input): Json<StartBatchRequest>,
) -> AppResult<impl IntoResponse> {
    let status = state
        .batches
        .start_batch(input.job_type, input.items, input.shared)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: status })))
}

/// GET /api/v1/batches
pub async fn list_batches(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let batches = state.batches.list().await;
    Ok(Json(DataResponse { data: batches }))
}

/// GET /api/v1/batches/{id}
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let status = state
        .batches
        .status(batch_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Batch {batch_id} not found")))?;

    Ok(Json(DataResponse { data: status }))
}

/// DELETE /api/v1/batches/{id}
///
/// Cancels pending and running items. Finished items keep their result.
pub async fn cancel_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let status = state
        .batches
        .cancel(batch_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Batch {batch_id} not found")))?;

    Ok(Json(DataResponse { data: status }))
}
