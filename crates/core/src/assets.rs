//! Object-store key and content-type helpers for uploaded assets.

use crate::error::CoreError;

/// Folder used when the caller does not name one.
pub const DEFAULT_FOLDER: &str = "uploads";

/// Maximum accepted upload size (20 MiB).
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Maximum folder path length.
const MAX_FOLDER_LEN: usize = 128;

/// Validate a folder prefix such as `line-art` or `colored/2024`.
pub fn validate_folder(folder: &str) -> Result<(), CoreError> {
    if folder.is_empty() || folder.len() > MAX_FOLDER_LEN {
        return Err(CoreError::Validation(format!(
            "Folder must be 1 to {MAX_FOLDER_LEN} characters"
        )));
    }
    if folder.starts_with('/') || folder.ends_with('/') || folder.contains("//") {
        return Err(CoreError::Validation(format!(
            "Folder '{folder}' must not have empty path segments"
        )));
    }
    if folder.split('/').any(|seg| seg == "." || seg == "..") {
        return Err(CoreError::Validation(
            "Folder must not contain relative path segments".to_string(),
        ));
    }
    if !folder
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
    {
        return Err(CoreError::Validation(format!(
            "Folder '{folder}' may only contain letters, digits, '-', '_' and '/'"
        )));
    }
    Ok(())
}

/// Map an image MIME type to the file extension we store it under.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    match content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Guess a MIME type from a file name or URL path.
pub fn content_type_for_path(path: &str) -> Option<&'static str> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Build the object key `{folder}/{yyyy}/{mm}/{id}.{ext}`.
pub fn build_asset_key(
    folder: &str,
    id: &uuid::Uuid,
    extension: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> String {
    format!("{folder}/{}/{id}.{extension}", now.format("%Y/%m"))
}

/// Join a public base URL and an object key without doubling slashes.
pub fn public_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}
