//! Request parameters for starting a job, and their validation.
//!
//! Validation runs before any network call so that a bad request never
//! creates a job.

use serde::{Deserialize, Serialize};

use crate::content::{validate_aspect_ratio, validate_output_format};
use crate::error::CoreError;
use crate::i18n::validate_languages;
use crate::job::JobType;

/// Default number of themes produced by one theme-generation job.
pub const DEFAULT_THEME_COUNT: u32 = 5;

/// Upper bound on themes per theme-generation job.
pub const MAX_THEME_COUNT: u32 = 20;

/// Maximum prompt length accepted from the UI.
const MAX_PROMPT_LEN: usize = 4000;

/// Image generation backends/models the admin can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageModel {
    #[default]
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "flux-kontext-pro")]
    FluxKontextPro,
    #[serde(rename = "flux-kontext-max")]
    FluxKontextMax,
}

impl ImageModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gpt4o => "gpt-4o",
            Self::FluxKontextPro => "flux-kontext-pro",
            Self::FluxKontextMax => "flux-kontext-max",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "gpt-4o" => Ok(Self::Gpt4o),
            "flux-kontext-pro" => Ok(Self::FluxKontextPro),
            "flux-kontext-max" => Ok(Self::FluxKontextMax),
            other => Err(CoreError::Validation(format!(
                "Unknown image model '{other}'. Must be one of: gpt-4o, flux-kontext-pro, flux-kontext-max"
            ))),
        }
    }
}

/// Parameters shared by every job type. Unused fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    /// Theme keyword, generation prompt, or coloring instruction.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Source image for image-to-image and colorization.
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub image_model: Option<ImageModel>,
    #[serde(default)]
    pub output_format: Option<String>,
    /// Target languages for content generation and translation.
    #[serde(default)]
    pub languages: Vec<String>,
    /// Number of themes to generate.
    #[serde(default)]
    pub count: Option<u32>,
    /// Text to translate, or extra context for content generation.
    #[serde(default)]
    pub source: Option<serde_json::Value>,
}

impl JobParams {
    /// Field-by-field overlay: values set on `self` win over `shared`.
    pub fn merged_with(&self, shared: &JobParams) -> JobParams {
        JobParams {
            prompt: self.prompt.clone().or_else(|| shared.prompt.clone()),
            image_url: self.image_url.clone().or_else(|| shared.image_url.clone()),
            aspect_ratio: self
                .aspect_ratio
                .clone()
                .or_else(|| shared.aspect_ratio.clone()),
            image_model: self.image_model.or(shared.image_model),
            output_format: self
                .output_format
                .clone()
                .or_else(|| shared.output_format.clone()),
            languages: if self.languages.is_empty() {
                shared.languages.clone()
            } else {
                self.languages.clone()
            },
            count: self.count.or(shared.count),
            source: self.source.clone().or_else(|| shared.source.clone()),
        }
    }

    pub fn theme_count(&self) -> u32 {
        self.count.unwrap_or(DEFAULT_THEME_COUNT)
    }

    /// Non-blank prompt, trimmed.
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Check that these parameters are sufficient for `job_type`.
    pub fn validate_for(&self, job_type: JobType) -> Result<(), CoreError> {
        if let Some(prompt) = &self.prompt {
            if prompt.len() > MAX_PROMPT_LEN {
                return Err(CoreError::Validation(format!(
                    "prompt must not exceed {MAX_PROMPT_LEN} characters"
                )));
            }
        }
        if let Some(ratio) = &self.aspect_ratio {
            validate_aspect_ratio(ratio)?;
        }
        if let Some(format) = &self.output_format {
            validate_output_format(format)?;
        }
        validate_languages(&self.languages)?;

        match job_type {
            JobType::ThemeGeneration => {
                self.require_prompt(job_type)?;
                let count = self.theme_count();
                if !(1..=MAX_THEME_COUNT).contains(&count) {
                    return Err(CoreError::Validation(format!(
                        "count must be between 1 and {MAX_THEME_COUNT}"
                    )));
                }
            }
            JobType::ContentGeneration => {
                self.require_prompt(job_type)?;
                self.require_languages(job_type)?;
            }
            JobType::Translation => {
                if !matches!(self.source, Some(serde_json::Value::Object(_))) {
                    return Err(CoreError::Validation(
                        "translation requires a source object".to_string(),
                    ));
                }
                self.require_languages(job_type)?;
            }
            JobType::TextToImage => {
                self.require_prompt(job_type)?;
            }
            JobType::ImageToImage | JobType::Colorization => {
                let url = self.image_url.as_deref().unwrap_or("");
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(CoreError::Validation(format!(
                        "{job_type} requires an http(s) image_url"
                    )));
                }
            }
        }
        Ok(())
    }

    fn require_prompt(&self, job_type: JobType) -> Result<(), CoreError> {
        self.prompt_text().map(|_| ()).ok_or_else(|| {
            CoreError::Validation(format!("{job_type} requires a non-empty prompt"))
        })
    }

    fn require_languages(&self, job_type: JobType) -> Result<(), CoreError> {
        if self.languages.is_empty() {
            Err(CoreError::Validation(format!(
                "{job_type} requires at least one language"
            )))
        } else {
            Ok(())
        }
    }
}
