//! Handlers for content items.
//!
//! Items are only written on explicit save. Deleting or updating an item
//! never touches jobs running for it.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use colorbook_core::error::CoreError;
use colorbook_core::i18n::{validate_language_code, validate_languages};
use colorbook_core::types::DbId;
use colorbook_db::models::content_item::{
    ContentItem, ContentItemDetail, ContentListEntry, ContentListParams, CreateContentItem,
    SetContentTags, UpdateContentItem,
};
use colorbook_db::repositories::ContentItemRepo;
use colorbook_providers::TranslationItem;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ContentTags {
    pub tag_ids: Vec<DbId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DisplayQuery {
    pub lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranslateContentRequest {
    /// Languages every localized field should end up with.
    pub languages: Vec<String>,
}

/// GET /api/v1/content
///
/// Filters: `category_id`, `tag_id`, `is_online`, `limit`, `offset`.
/// With `lang`, each item also carries resolved `display` strings.
pub async fn list_content(
    State(state): State<AppState>,
    Query(params): Query<ContentListParams>,
) -> AppResult<impl IntoResponse> {
    let lang = display_lang(params.lang.as_deref())?;
    let items = ContentItemRepo::list(&state.pool, &params).await?;
    let entries: Vec<ContentListEntry> = items
        .into_iter()
        .map(|item| ContentListEntry {
            display: lang.map(|lang| item.display(lang)),
            item,
        })
        .collect();
    Ok(Json(DataResponse { data: entries }))
}

/// POST /api/v1/content
pub async fn create_content(
    State(state): State<AppState>,
    Json(input): Json<CreateContentItem>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let item = ContentItemRepo::create(&state.pool, &input).await?;
    tracing::info!(content_id = item.id, "Content item created");

    let detail = with_tags(&state, item).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: detail })))
}

/// GET /api/v1/content/{id}
///
/// Accepts `lang` like the list endpoint.
pub async fn get_content(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(query): Query<DisplayQuery>,
) -> AppResult<impl IntoResponse> {
    let lang = display_lang(query.lang.as_deref())?;
    let item = find(&state, id).await?;
    let mut detail = with_tags(&state, item).await?;
    detail.display = lang.map(|lang| detail.item.display(lang));
    Ok(Json(DataResponse { data: detail }))
}

/// PUT /api/v1/content/{id}
///
/// Partial update; absent fields keep their stored values.
pub async fn update_content(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateContentItem>,
) -> AppResult<impl IntoResponse> {
    let current = find(&state, id).await?;
    input.validate(&current)?;

    let item = ContentItemRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(not_found(id))?;
    tracing::info!(content_id = id, "Content item updated");

    let detail = with_tags(&state, item).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// DELETE /api/v1/content/{id}
pub async fn delete_content(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !ContentItemRepo::delete(&state.pool, id).await? {
        return Err(not_found(id));
    }
    tracing::info!(content_id = id, "Content item deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/content/{id}/tags
///
/// Replace the item's tag set. Unknown tag ids are a 400.
pub async fn set_content_tags(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<SetContentTags>,
) -> AppResult<impl IntoResponse> {
    let tag_ids = ContentItemRepo::set_tags(&state.pool, id, &input.tag_ids)
        .await?
        .ok_or(not_found(id))?;

    Ok(Json(DataResponse {
        data: ContentTags { tag_ids },
    }))
}

/// POST /api/v1/content/{id}/translate
///
/// Translate every localized field into the requested languages it still
/// lacks and save the result. Existing translations are kept as they are.
pub async fn translate_content(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<TranslateContentRequest>,
) -> AppResult<impl IntoResponse> {
    if input.languages.is_empty() {
        return Err(AppError::BadRequest("languages must not be empty".into()));
    }
    validate_languages(&input.languages)?;

    let item = find(&state, id).await?;
    let fields = item.untranslated_fields(&input.languages);
    if fields.is_empty() {
        let detail = with_tags(&state, item).await?;
        return Ok(Json(DataResponse { data: detail }));
    }

    let request = [TranslationItem {
        id: id.to_string(),
        fields,
    }];
    let mut translations = state
        .translator
        .translate(&request, &input.languages)
        .await?;
    let by_language = translations.remove(&request[0].id).unwrap_or_default();
    if by_language.is_empty() {
        tracing::warn!(content_id = id, "Translator returned nothing for item");
        let detail = with_tags(&state, item).await?;
        return Ok(Json(DataResponse { data: detail }));
    }

    let patch = item.translation_patch(&input.languages, &by_language);
    let item = ContentItemRepo::update(&state.pool, id, &patch)
        .await?
        .ok_or(not_found(id))?;
    tracing::info!(
        content_id = id,
        languages = ?input.languages,
        "Content item translated",
    );

    let detail = with_tags(&state, item).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// Validated display language, if one was requested.
fn display_lang(lang: Option<&str>) -> AppResult<Option<&str>> {
    match lang.map(str::trim).filter(|l| !l.is_empty()) {
        Some(lang) => {
            validate_language_code(lang)?;
            Ok(Some(lang))
        }
        None => Ok(None),
    }
}

async fn find(state: &AppState, id: DbId) -> AppResult<ContentItem> {
    ContentItemRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(not_found(id))
}

async fn with_tags(state: &AppState, item: ContentItem) -> AppResult<ContentItemDetail> {
    let tag_ids = ContentItemRepo::tag_ids(&state.pool, item.id).await?;
    Ok(ContentItemDetail {
        item,
        tag_ids,
        display: None,
    })
}

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "ContentItem",
        id,
    })
}
