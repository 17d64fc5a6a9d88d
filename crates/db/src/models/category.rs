//! Category models and DTOs.

use colorbook_core::content::{validate_localized, validate_slug};
use colorbook_core::error::CoreError;
use colorbook_core::i18n::LocalizedText;
use colorbook_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `categories` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Category {
    pub id: DbId,
    pub slug: String,
    pub name: Json<LocalizedText>,
    pub description: Json<LocalizedText>,
    pub sort_order: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategory {
    pub slug: String,
    #[serde(default)]
    pub name: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    pub sort_order: Option<i32>,
}

impl CreateCategory {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_slug(&self.slug)?;
        if self.name.is_blank() {
            return Err(CoreError::Validation(
                "Category name must be set in at least one language".to_string(),
            ));
        }
        validate_localized("name", &self.name)?;
        validate_localized("description", &self.description)
    }
}

/// DTO for updating a category. Absent fields are left unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCategory {
    pub slug: Option<String>,
    pub name: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
    pub sort_order: Option<i32>,
}

impl UpdateCategory {
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
        }
        if let Some(name) = &self.name {
            if name.is_blank() {
                return Err(CoreError::Validation(
                    "Category name must not be blank".to_string(),
                ));
            }
            validate_localized("name", name)?;
        }
        if let Some(description) = &self.description {
            validate_localized("description", description)?;
        }
        Ok(())
    }
}
