//! Content item models and DTOs.

use std::collections::BTreeMap;

use colorbook_core::content::{
    validate_aspect_ratio, validate_has_text, validate_hotness, validate_localized,
    validate_output_format,
};
use colorbook_core::error::CoreError;
use colorbook_core::i18n::{LocalizedText, LANG_EN};
use colorbook_core::params::ImageModel;
use colorbook_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use super::double_option;

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A row from the `content_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContentItem {
    pub id: DbId,
    /// Id generated by the admin UI before the first save.
    pub client_key: Option<String>,
    pub name: Json<LocalizedText>,
    pub title: Json<LocalizedText>,
    pub description: Json<LocalizedText>,
    pub prompt: Json<LocalizedText>,
    pub body: Json<LocalizedText>,
    pub line_art_url: Option<String>,
    pub colored_url: Option<String>,
    pub user_color_url: Option<String>,
    pub aspect_ratio: String,
    pub image_model: String,
    pub output_format: String,
    pub category_id: Option<DbId>,
    pub is_public: bool,
    pub is_online: bool,
    pub hotness: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Display strings of an item resolved for one language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentDisplay {
    pub lang: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// A listed content item, with display strings when a language was requested.
#[derive(Debug, Clone, Serialize)]
pub struct ContentListEntry {
    #[serde(flatten)]
    pub item: ContentItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<ContentDisplay>,
}

/// A content item together with its tag ids.
#[derive(Debug, Clone, Serialize)]
pub struct ContentItemDetail {
    #[serde(flatten)]
    pub item: ContentItem,
    pub tag_ids: Vec<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<ContentDisplay>,
}

impl ContentItem {
    /// Resolve name, title and description for `lang`.
    ///
    /// Each field falls back independently: `lang`, then `en`, then `zh`,
    /// then any language that has text.
    pub fn display(&self, lang: &str) -> ContentDisplay {
        let resolve = |text: &LocalizedText| text.resolve(lang).map(str::to_string);
        ContentDisplay {
            lang: lang.to_string(),
            name: resolve(&self.name.0),
            title: resolve(&self.title.0),
            description: resolve(&self.description.0),
        }
    }

    fn localized_fields(&self) -> [(&'static str, &LocalizedText); 5] {
        [
            ("name", &self.name.0),
            ("title", &self.title.0),
            ("description", &self.description.0),
            ("prompt", &self.prompt.0),
            ("body", &self.body.0),
        ]
    }

    /// Source text of every field still lacking one of `languages`.
    ///
    /// Keyed by field name. The source is the English text when present,
    /// otherwise the field's best fallback. Fields with no text at all
    /// are skipped.
    pub fn untranslated_fields(&self, languages: &[String]) -> BTreeMap<String, String> {
        self.localized_fields()
            .into_iter()
            .filter(|(_, text)| !text.missing_languages(languages).is_empty())
            .filter_map(|(field, text)| {
                text.resolve(LANG_EN)
                    .map(|source| (field.to_string(), source.to_string()))
            })
            .collect()
    }

    /// Build a patch filling the languages each field lacks.
    ///
    /// `translations` is keyed language -> field -> text. Languages a field
    /// already has are left untouched, and fields gaining nothing stay
    /// absent from the patch.
    pub fn translation_patch(
        &self,
        languages: &[String],
        translations: &BTreeMap<String, BTreeMap<String, String>>,
    ) -> UpdateContentItem {
        let mut patch = UpdateContentItem::default();
        for (field, current, slot) in [
            ("name", &self.name.0, &mut patch.name),
            ("title", &self.title.0, &mut patch.title),
            ("description", &self.description.0, &mut patch.description),
            ("prompt", &self.prompt.0, &mut patch.prompt),
            ("body", &self.body.0, &mut patch.body),
        ] {
            let added: LocalizedText = current
                .missing_languages(languages)
                .into_iter()
                .filter_map(|lang| {
                    translations
                        .get(lang)
                        .and_then(|fields| fields.get(field))
                        .map(|text| (lang, text.as_str()))
                })
                .collect();
            if added.is_blank() {
                continue;
            }
            let mut merged = current.clone();
            merged.merge(&added);
            *slot = Some(merged);
        }
        patch
    }
}

// ---------------------------------------------------------------------------
// DTOs (request payloads)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateContentItem {
    pub client_key: Option<String>,
    #[serde(default)]
    pub name: LocalizedText,
    #[serde(default)]
    pub title: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(default)]
    pub prompt: LocalizedText,
    #[serde(default)]
    pub body: LocalizedText,
    pub line_art_url: Option<String>,
    pub colored_url: Option<String>,
    pub user_color_url: Option<String>,
    pub aspect_ratio: Option<String>,
    pub image_model: Option<String>,
    pub output_format: Option<String>,
    pub category_id: Option<DbId>,
    pub is_public: Option<bool>,
    pub is_online: Option<bool>,
    pub hotness: Option<i32>,
    /// Tags to attach on creation.
    #[serde(default)]
    pub tag_ids: Vec<DbId>,
}

impl CreateContentItem {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_has_text(&self.name, &self.title, &self.prompt)?;
        for (field, text) in [
            ("name", &self.name),
            ("title", &self.title),
            ("description", &self.description),
            ("prompt", &self.prompt),
            ("body", &self.body),
        ] {
            validate_localized(field, text)?;
        }
        validate_generation_params(
            self.aspect_ratio.as_deref(),
            self.image_model.as_deref(),
            self.output_format.as_deref(),
        )?;
        if let Some(hotness) = self.hotness {
            validate_hotness(hotness)?;
        }
        Ok(())
    }
}

/// Partial update. Absent fields keep their stored value; an explicit
/// `null` clears the image URLs and the category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContentItem {
    pub client_key: Option<String>,
    pub name: Option<LocalizedText>,
    pub title: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
    pub prompt: Option<LocalizedText>,
    pub body: Option<LocalizedText>,
    #[serde(default, deserialize_with = "double_option")]
    pub line_art_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub colored_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub user_color_url: Option<Option<String>>,
    pub aspect_ratio: Option<String>,
    pub image_model: Option<String>,
    pub output_format: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<DbId>>,
    pub is_public: Option<bool>,
    pub is_online: Option<bool>,
    pub hotness: Option<i32>,
}

impl UpdateContentItem {
    /// Validate the patch against the stored item it will be applied to.
    ///
    /// The text requirement is checked on the merged result so that a
    /// patch cannot blank out the last identifying field.
    pub fn validate(&self, current: &ContentItem) -> Result<(), CoreError> {
        let name = self.name.as_ref().unwrap_or(&current.name.0);
        let title = self.title.as_ref().unwrap_or(&current.title.0);
        let prompt = self.prompt.as_ref().unwrap_or(&current.prompt.0);
        validate_has_text(name, title, prompt)?;

        for (field, text) in [
            ("name", &self.name),
            ("title", &self.title),
            ("description", &self.description),
            ("prompt", &self.prompt),
            ("body", &self.body),
        ] {
            if let Some(text) = text {
                validate_localized(field, text)?;
            }
        }
        validate_generation_params(
            self.aspect_ratio.as_deref(),
            self.image_model.as_deref(),
            self.output_format.as_deref(),
        )?;
        if let Some(hotness) = self.hotness {
            validate_hotness(hotness)?;
        }
        Ok(())
    }
}

/// Query parameters for listing content items.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentListParams {
    pub category_id: Option<DbId>,
    pub tag_id: Option<DbId>,
    pub is_online: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Display language; adds resolved display strings, never filters.
    pub lang: Option<String>,
}

/// DTO replacing the tag set of an item.
#[derive(Debug, Clone, Deserialize)]
pub struct SetContentTags {
    pub tag_ids: Vec<DbId>,
}

fn validate_generation_params(
    aspect_ratio: Option<&str>,
    image_model: Option<&str>,
    output_format: Option<&str>,
) -> Result<(), CoreError> {
    if let Some(ratio) = aspect_ratio {
        validate_aspect_ratio(ratio)?;
    }
    if let Some(model) = image_model {
        ImageModel::from_name(model)?;
    }
    if let Some(format) = output_format {
        validate_output_format(format)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> CreateContentItem {
        CreateContentItem {
            name: LocalizedText::single("en", name),
            ..Default::default()
        }
    }

    fn stored() -> ContentItem {
        let now = chrono::Utc::now();
        ContentItem {
            id: 1,
            client_key: None,
            name: Json(LocalizedText::single("zh", "小猫")),
            title: Json(LocalizedText::new()),
            description: Json(LocalizedText::new()),
            prompt: Json(LocalizedText::new()),
            body: Json(LocalizedText::new()),
            line_art_url: None,
            colored_url: None,
            user_color_url: None,
            aspect_ratio: "2:3".into(),
            image_model: "gpt-4o".into(),
            output_format: "png".into(),
            category_id: None,
            is_public: false,
            is_online: false,
            hotness: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_needs_some_text() {
        assert!(named("Kitten").validate().is_ok());
        assert!(CreateContentItem::default().validate().is_err());
    }

    #[test]
    fn create_rejects_unknown_generation_params() {
        let mut dto = named("Kitten");
        dto.image_model = Some("dall-e-3".into());
        assert!(dto.validate().is_err());

        let mut dto = named("Kitten");
        dto.aspect_ratio = Some("5:4".into());
        assert!(dto.validate().is_err());

        let mut dto = named("Kitten");
        dto.hotness = Some(-5);
        assert!(dto.validate().is_err());
    }

    #[test]
    fn update_cannot_blank_last_text_field() {
        let current = stored();
        let patch = UpdateContentItem {
            name: Some(LocalizedText::new()),
            ..Default::default()
        };
        assert!(patch.validate(&current).is_err());

        let patch = UpdateContentItem {
            name: Some(LocalizedText::new()),
            title: Some(LocalizedText::single("en", "Kitten")),
            ..Default::default()
        };
        assert!(patch.validate(&current).is_ok());
    }

    #[test]
    fn detail_flattens_item() {
        let detail = ContentItemDetail {
            item: stored(),
            tag_ids: vec![3, 4],
            display: None,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["name"]["zh"], "小猫");
        assert_eq!(json["tag_ids"], serde_json::json!([3, 4]));
        assert!(json.get("display").is_none());
    }

    #[test]
    fn update_distinguishes_absent_null_and_value() {
        let patch: UpdateContentItem = serde_json::from_value(serde_json::json!({
            "colored_url": null,
            "category_id": 7,
        }))
        .unwrap();
        assert_eq!(patch.line_art_url, None);
        assert_eq!(patch.colored_url, Some(None));
        assert_eq!(patch.category_id, Some(Some(7)));
    }

    #[test]
    fn display_falls_back_per_field() {
        let mut item = stored();
        item.title = Json(LocalizedText::from_iter([("en", "Kitten"), ("ja", "子猫")]));

        let display = item.display("ja");
        assert_eq!(display.name.as_deref(), Some("小猫"));
        assert_eq!(display.title.as_deref(), Some("子猫"));
        assert_eq!(display.description, None);

        assert_eq!(item.display("fr").title.as_deref(), Some("Kitten"));
    }

    #[test]
    fn untranslated_fields_use_english_source_when_present() {
        let mut item = stored();
        item.title = Json(LocalizedText::from_iter([("en", "Kitten"), ("zh", "小猫咪")]));
        let languages = vec!["zh".to_string(), "ja".to_string()];

        let fields = item.untranslated_fields(&languages);
        assert_eq!(fields.get("title").map(String::as_str), Some("Kitten"));
        // Only zh text: the fallback becomes the source.
        assert_eq!(fields.get("name").map(String::as_str), Some("小猫"));
        assert!(!fields.contains_key("body"));

        let all = vec!["zh".to_string()];
        assert!(!item.untranslated_fields(&all).contains_key("title"));
    }

    #[test]
    fn translation_patch_only_fills_missing_languages() {
        let item = stored();
        let languages = vec!["zh".to_string(), "en".to_string()];
        let translations: BTreeMap<String, BTreeMap<String, String>> = [
            ("zh", [("name", "覆盖")]),
            ("en", [("name", "Kitten")]),
        ]
        .into_iter()
        .map(|(lang, fields)| {
            let fields: BTreeMap<String, String> = fields
                .into_iter()
                .map(|(f, t)| (f.to_string(), t.to_string()))
                .collect();
            (lang.to_string(), fields)
        })
        .collect();

        let patch = item.translation_patch(&languages, &translations);
        let name = patch.name.expect("name gains en");
        assert_eq!(name.get("zh"), Some("小猫"));
        assert_eq!(name.get("en"), Some("Kitten"));
        assert!(patch.title.is_none());
        assert!(patch.body.is_none());
    }
}
