//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches
//!
//! Localized columns are JSONB objects mapped to
//! [`LocalizedText`](colorbook_core::i18n::LocalizedText).

pub mod category;
pub mod content_item;
pub mod tag;

use serde::{Deserialize, Deserializer};

/// Serde helper for nullable columns in update DTOs.
///
/// * field absent => `None` (keep stored value)
/// * field `null` => `Some(None)` (clear)
/// * field value  => `Some(Some(v))` (set)
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}
