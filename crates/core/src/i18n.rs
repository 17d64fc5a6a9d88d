//! Multi-language text fields.
//!
//! Every user-facing text field on a content item (name, title,
//! description, prompt, body) is a [`LocalizedText`]: a map from language
//! code to string. A missing or blank entry means "not translated yet".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// English language code.
pub const LANG_EN: &str = "en";

/// Simplified Chinese language code.
pub const LANG_ZH: &str = "zh";

/// Languages the admin UI offers out of the box.
pub const DEFAULT_LANGUAGES: &[&str] = &[LANG_EN, LANG_ZH, "ja", "ko", "es", "fr", "de", "pt"];

/// Text keyed by language code, serialized as a plain JSON object
/// (`{"en": "Cat", "zh": "猫"}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a single-language value.
    pub fn single(lang: impl Into<String>, text: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(lang.into(), text.into());
        Self(map)
    }

    /// Text for exactly `lang`, if present and non-blank.
    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0
            .get(lang)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn set(&mut self, lang: impl Into<String>, text: impl Into<String>) {
        self.0.insert(lang.into(), text.into());
    }

    pub fn remove(&mut self, lang: &str) -> Option<String> {
        self.0.remove(lang)
    }

    /// Resolve the best display text for `preferred`.
    ///
    /// Fallback order: `preferred` -> `en` -> `zh` -> first non-blank entry
    /// in language-code order.
    pub fn resolve(&self, preferred: &str) -> Option<&str> {
        self.get(preferred)
            .or_else(|| self.get(LANG_EN))
            .or_else(|| self.get(LANG_ZH))
            .or_else(|| {
                self.0
                    .values()
                    .map(String::as_str)
                    .find(|s| !s.trim().is_empty())
            })
    }

    /// True when no language carries non-blank text.
    pub fn is_blank(&self) -> bool {
        self.0.values().all(|s| s.trim().is_empty())
    }

    /// Languages with non-blank text.
    pub fn languages(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Which of `targets` still lack text.
    pub fn missing_languages<'a>(&self, targets: &'a [String]) -> Vec<&'a str> {
        targets
            .iter()
            .filter(|lang| self.get(lang).is_none())
            .map(String::as_str)
            .collect()
    }

    /// Overlay `other` onto `self`. Non-blank entries of `other` win.
    pub fn merge(&mut self, other: &LocalizedText) {
        for (lang, text) in &other.0 {
            if !text.trim().is_empty() {
                self.0.insert(lang.clone(), text.clone());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LocalizedText {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Validate a language code such as `en`, `zh`, `pt-BR` or `zh-TW`.
pub fn validate_language_code(code: &str) -> Result<(), CoreError> {
    let (primary, region) = match code.split_once('-') {
        Some((p, r)) => (p, Some(r)),
        None => (code, None),
    };

    let primary_ok =
        (2..=3).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_lowercase());
    let region_ok = region.map_or(true, |r| {
        (2..=4).contains(&r.len()) && r.chars().all(|c| c.is_ascii_alphanumeric())
    });

    if primary_ok && region_ok {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid language code '{code}'"
        )))
    }
}

/// Validate every code in `codes`, rejecting duplicates.
pub fn validate_languages(codes: &[String]) -> Result<(), CoreError> {
    let mut seen = std::collections::HashSet::with_capacity(codes.len());
    for code in codes {
        validate_language_code(code)?;
        if !seen.insert(code.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate language code '{code}'"
            )));
        }
    }
    Ok(())
}
