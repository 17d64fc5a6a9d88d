//! Handlers for image assets in object storage.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use colorbook_core::assets::{validate_folder, DEFAULT_FOLDER};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;
use crate::storage::{self, StoredAsset};

#[derive(Debug, Deserialize)]
pub struct ImportAssetRequest {
    pub url: String,
    pub folder: Option<String>,
}

/// POST /api/v1/assets
///
/// Multipart upload with a `file` part and an optional `folder` part.
pub async fn upload_asset(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<StoredAsset>>)> {
    let mut folder = DEFAULT_FOLDER.to_string();
    let mut file: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("folder") => {
                folder = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?
                    .trim()
                    .to_string();
            }
            Some("file") => {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .or_else(|| {
                        field
                            .file_name()
                            .and_then(colorbook_core::assets::content_type_for_path)
                            .map(str::to_string)
                    })
                    .unwrap_or_default();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file = Some((data.to_vec(), content_type));
            }
            _ => {}
        }
    }

    let (bytes, content_type) =
        file.ok_or_else(|| AppError::BadRequest("multipart field 'file' is required".into()))?;
    validate_folder(&folder)?;

    let asset = storage::store_image(state.assets.as_ref(), &folder, bytes, &content_type).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: asset })))
}

/// POST /api/v1/assets/import
///
/// Copy a generated image from the provider's CDN into our bucket.
pub async fn import_asset(
    State(state): State<AppState>,
    Json(input): Json<ImportAssetRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<StoredAsset>>)> {
    let url = input.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AppError::BadRequest("url must be an http(s) URL".into()));
    }
    let folder = input.folder.as_deref().unwrap_or(DEFAULT_FOLDER);
    validate_folder(folder)?;

    let asset =
        storage::import_from_url(state.assets.as_ref(), &state.http, url, folder).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: asset })))
}
