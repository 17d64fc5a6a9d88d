//! Content item constants and validation.
//!
//! Pure checks used by the API before anything is written to the store.

use crate::error::CoreError;
use crate::i18n::LocalizedText;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Aspect ratios the image backends accept.
pub const VALID_ASPECT_RATIOS: &[&str] = &["1:1", "3:2", "2:3", "4:3", "3:4", "16:9", "9:16"];

/// Default aspect ratio for coloring pages (portrait sheet).
pub const DEFAULT_ASPECT_RATIO: &str = "2:3";

/// Output formats the image backends accept.
pub const VALID_OUTPUT_FORMATS: &[&str] = &["png", "jpeg", "webp"];

/// Default output format.
pub const DEFAULT_OUTPUT_FORMAT: &str = "png";

/// Upper bound on the ranking weight.
pub const MAX_HOTNESS: i32 = 1_000_000;

/// Maximum slug length for categories and tags.
const MAX_SLUG_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_aspect_ratio(ratio: &str) -> Result<(), CoreError> {
    if VALID_ASPECT_RATIOS.contains(&ratio) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid aspect ratio '{ratio}'. Must be one of: {}",
            VALID_ASPECT_RATIOS.join(", ")
        )))
    }
}

pub fn validate_output_format(format: &str) -> Result<(), CoreError> {
    if VALID_OUTPUT_FORMATS.contains(&format) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid output format '{format}'. Must be one of: {}",
            VALID_OUTPUT_FORMATS.join(", ")
        )))
    }
}

pub fn validate_hotness(hotness: i32) -> Result<(), CoreError> {
    if (0..=MAX_HOTNESS).contains(&hotness) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "hotness must be between 0 and {MAX_HOTNESS}"
        )))
    }
}

/// Slugs are lowercase ASCII alphanumerics and hyphens, 1..=64 chars,
/// without leading/trailing hyphens.
pub fn validate_slug(slug: &str) -> Result<(), CoreError> {
    if slug.is_empty() || slug.len() > MAX_SLUG_LEN {
        return Err(CoreError::Validation(format!(
            "Slug must be 1 to {MAX_SLUG_LEN} characters"
        )));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(CoreError::Validation(
            "Slug must not start or end with a hyphen".to_string(),
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(CoreError::Validation(format!(
            "Slug '{slug}' may only contain lowercase letters, digits and hyphens"
        )));
    }
    Ok(())
}

/// A saved content item must carry text in at least one language for at
/// least one of its identifying fields.
pub fn validate_has_text(
    name: &LocalizedText,
    title: &LocalizedText,
    prompt: &LocalizedText,
) -> Result<(), CoreError> {
    if name.is_blank() && title.is_blank() && prompt.is_blank() {
        Err(CoreError::Validation(
            "Content item needs a name, title or prompt in at least one language".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate every language key used inside a localized value.
pub fn validate_localized(field: &str, text: &LocalizedText) -> Result<(), CoreError> {
    for (lang, _) in text.iter() {
        crate::i18n::validate_language_code(lang)
            .map_err(|_| CoreError::Validation(format!("{field}: invalid language code '{lang}'")))?;
    }
    Ok(())
}
