//! OpenAI-compatible chat model used for every text job.
//!
//! Theme generation, content generation and translation are single chat
//! completions that must answer with a JSON object. Replies wrapped in a
//! Markdown code fence are accepted; anything that does not parse as a
//! JSON object is a [`ProviderError::Malformed`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use colorbook_core::job::JobType;
use colorbook_core::params::JobParams;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::http::read_json;

/// Sampling temperature for creative generation.
const CREATIVE_TEMPERATURE: f32 = 0.8;

/// Sampling temperature for translation.
const TRANSLATION_TEMPERATURE: f32 = 0.2;

/// item id -> language -> field -> translated text.
pub type TranslationMap = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// One item sent for bulk translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationItem {
    pub id: String,
    /// field name -> source text
    pub fields: BTreeMap<String, String>,
}

/// Server-side bulk translation.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        items: &[TranslationItem],
        languages: &[String],
    ) -> Result<TranslationMap, ProviderError>;
}

/// Chat-completions client.
pub struct TextClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl TextClient {
    /// * `base_url` - API root including the version, e.g. `https://api.openai.com/v1`.
    pub fn new(client: reqwest::Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run the text job `job_type` and return its JSON result.
    pub async fn run(
        &self,
        job_type: JobType,
        params: &JobParams,
    ) -> Result<serde_json::Value, ProviderError> {
        let (system, user, temperature) = build_prompt(job_type, params)?;
        self.complete_json(&system, &user, temperature).await
    }

    /// One chat completion whose reply must be a JSON object.
    pub async fn complete_json(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<serde_json::Value, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let chat: ChatResponse = read_json(response).await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("chat reply without content".into()))?;

        parse_json_reply(&content)
    }
}

#[async_trait]
impl Translator for TextClient {
    async fn translate(
        &self,
        items: &[TranslationItem],
        languages: &[String],
    ) -> Result<TranslationMap, ProviderError> {
        if items.is_empty() || languages.is_empty() {
            return Ok(TranslationMap::new());
        }

        let payload = serde_json::json!({ "items": items, "languages": languages });
        let user = serde_json::to_string(&payload)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let reply = self
            .complete_json(BULK_TRANSLATION_SYSTEM, &user, TRANSLATION_TEMPERATURE)
            .await?;

        let map = parse_translation_map(reply)?;
        tracing::info!(
            items = items.len(),
            translated = map.len(),
            languages = languages.len(),
            "Bulk translation finished",
        );
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

const THEME_SYSTEM: &str = "You plan coloring book pages. Reply with a JSON object \
     {\"themes\": [{\"name\": string, \"prompt\": string}]}. Each prompt describes one \
     simple scene suitable for black and white line art.";

const CONTENT_SYSTEM: &str = "You write listings for coloring pages. Reply with a JSON object \
     whose keys are language codes; each value is {\"name\", \"title\", \"description\", \
     \"body\"} written natively in that language.";

const TRANSLATION_SYSTEM: &str = "You translate coloring page listings. Reply with a JSON object \
     whose keys are the requested language codes; each value maps every source field name \
     to its translation. Keep names short and child friendly.";

const BULK_TRANSLATION_SYSTEM: &str = "You translate coloring page listings in bulk. The input \
     has `items` (each with `id` and `fields`) and `languages`. Reply with a JSON object \
     {item id: {language code: {field name: translation}}} covering every item and language.";

/// Build `(system, user, temperature)` for a text job.
pub fn build_prompt(
    job_type: JobType,
    params: &JobParams,
) -> Result<(String, String, f32), ProviderError> {
    let prompt = params.prompt_text().unwrap_or_default();
    match job_type {
        JobType::ThemeGeneration => Ok((
            THEME_SYSTEM.to_string(),
            format!(
                "Keyword: {prompt}\nNumber of themes: {}",
                params.theme_count()
            ),
            CREATIVE_TEMPERATURE,
        )),
        JobType::ContentGeneration => {
            let mut user = format!(
                "Page prompt: {prompt}\nLanguages: {}",
                params.languages.join(", ")
            );
            if let Some(context) = &params.source {
                user.push_str(&format!("\nContext: {context}"));
            }
            Ok((CONTENT_SYSTEM.to_string(), user, CREATIVE_TEMPERATURE))
        }
        JobType::Translation => {
            let source = params
                .source
                .as_ref()
                .ok_or_else(|| ProviderError::Malformed("translation without source".into()))?;
            Ok((
                TRANSLATION_SYSTEM.to_string(),
                format!(
                    "Source fields: {source}\nTarget languages: {}",
                    params.languages.join(", ")
                ),
                TRANSLATION_TEMPERATURE,
            ))
        }
        other => Err(ProviderError::Unsupported(other)),
    }
}

/// Strip an optional Markdown code fence and parse a JSON object.
pub fn parse_json_reply(content: &str) -> Result<serde_json::Value, ProviderError> {
    let trimmed = strip_code_fence(content);
    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| ProviderError::Malformed(format!("reply is not JSON: {e}")))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(ProviderError::Malformed("reply is not a JSON object".into()))
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.split_once('\n') {
        // Drop the info string (e.g. `json`) up to the first newline.
        Some((_, body)) => body,
        // One-line fence: the info string, if any, ends at the payload.
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Decode a bulk translation reply, dropping entries that are not strings.
fn parse_translation_map(reply: serde_json::Value) -> Result<TranslationMap, ProviderError> {
    let serde_json::Value::Object(items) = reply else {
        return Err(ProviderError::Malformed("translation reply is not an object".into()));
    };

    let mut map = TranslationMap::new();
    for (item_id, langs) in items {
        let serde_json::Value::Object(langs) = langs else {
            continue;
        };
        let entry = map.entry(item_id).or_default();
        for (lang, fields) in langs {
            let serde_json::Value::Object(fields) = fields else {
                continue;
            };
            let fields: BTreeMap<String, String> = fields
                .into_iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                .collect();
            if !fields.is_empty() {
                entry.insert(lang, fields);
            }
        }
    }
    map.retain(|_, langs| !langs.is_empty());
    Ok(map)
}
