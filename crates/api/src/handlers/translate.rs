//! Bulk translation on the request path.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use colorbook_core::i18n::validate_languages;
use colorbook_providers::TranslationItem;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Maximum items per translation request.
const MAX_ITEMS: usize = 100;

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub items: Vec<TranslationItem>,
    /// Target language codes.
    pub languages: Vec<String>,
}

/// POST /api/v1/translate
///
/// Translate the fields of many items at once. The reply is keyed
/// `item id -> language -> field`. Items the model skipped are absent.
pub async fn translate(
    State(state): State<AppState>,
    Json(input): Json<TranslateRequest>,
) -> AppResult<impl IntoResponse> {
    if input.items.is_empty() {
        return Err(AppError::BadRequest("items must not be empty".into()));
    }
    if input.items.len() > MAX_ITEMS {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_ITEMS} items per request"
        )));
    }
    if input.languages.is_empty() {
        return Err(AppError::BadRequest("languages must not be empty".into()));
    }
    validate_languages(&input.languages)?;

    let translations = state
        .translator
        .translate(&input.items, &input.languages)
        .await?;

    Ok(Json(DataResponse { data: translations }))
}
