//! Tag models and DTOs.

use colorbook_core::content::{validate_localized, validate_slug};
use colorbook_core::error::CoreError;
use colorbook_core::i18n::LocalizedText;
use colorbook_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `tags` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tag {
    pub id: DbId,
    pub slug: String,
    pub name: Json<LocalizedText>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTag {
    pub slug: String,
    #[serde(default)]
    pub name: LocalizedText,
}

impl CreateTag {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_slug(&self.slug)?;
        if self.name.is_blank() {
            return Err(CoreError::Validation(
                "Tag name must be set in at least one language".to_string(),
            ));
        }
        validate_localized("name", &self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTag {
    pub slug: Option<String>,
    pub name: Option<LocalizedText>,
}

impl UpdateTag {
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
        }
        if let Some(name) = &self.name {
            if name.is_blank() {
                return Err(CoreError::Validation("Tag name must not be blank".to_string()));
            }
            validate_localized("name", name)?;
        }
        Ok(())
    }
}
