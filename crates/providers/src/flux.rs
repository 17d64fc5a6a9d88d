//! Flux Kontext image task API.
//!
//! Same envelope as the GPT-4o API but a different status vocabulary:
//! `successFlag` is `0` while generating, `1` on success and `2`/`3` on
//! failure. No progress is reported.

use colorbook_core::job::{JobResult, PollOutcome};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::http::read_envelope;

/// HTTP client for the Flux Kontext endpoints.
pub struct FluxKontextApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_image: Option<&'a str>,
    aspect_ratio: &'a str,
    output_format: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskCreated {
    task_id: String,
}

/// `data` of a Flux record-info response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxRecord {
    #[serde(default)]
    pub success_flag: Option<i64>,
    #[serde(default)]
    pub response: Option<FluxRecordResponse>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxRecordResponse {
    #[serde(default)]
    pub result_image_url: Option<String>,
}

impl FluxRecord {
    pub fn into_outcome(self) -> PollOutcome {
        match self.success_flag {
            Some(1) => PollOutcome::succeeded(
                self.response
                    .and_then(|r| r.result_image_url)
                    .filter(|u| !u.trim().is_empty())
                    .map(JobResult::url),
            ),
            Some(2) | Some(3) => PollOutcome::failed(self.error_message),
            _ => PollOutcome::in_progress(None),
        }
    }
}

/// Flux supports 21:9, 16:9, 4:3, 1:1, 3:4 and 9:16.
pub fn flux_aspect_ratio(ratio: &str) -> &'static str {
    match ratio {
        "1:1" => "1:1",
        "16:9" => "16:9",
        "9:16" => "9:16",
        "4:3" | "3:2" => "4:3",
        _ => "3:4",
    }
}

/// Flux renders png or jpeg only.
pub fn flux_output_format(format: &str) -> &'static str {
    match format {
        "jpeg" => "jpeg",
        _ => "png",
    }
}

impl FluxKontextApi {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Queue a generation with the given Flux `model` name.
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        aspect_ratio: &str,
        output_format: &str,
        input_image: Option<&str>,
    ) -> Result<String, ProviderError> {
        let body = GenerateRequest {
            prompt,
            input_image,
            aspect_ratio: flux_aspect_ratio(aspect_ratio),
            output_format: flux_output_format(output_format),
            model,
        };

        let response = self
            .client
            .post(format!("{}/api/v1/flux/kontext/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let created: TaskCreated = read_envelope(response).await?;
        Ok(created.task_id)
    }

    pub async fn record_info(&self, task_id: &str) -> Result<PollOutcome, ProviderError> {
        let response = self
            .client
            .get(format!("{}/api/v1/flux/kontext/record-info", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("taskId", task_id)])
            .send()
            .await?;

        let record: FluxRecord = read_envelope(response).await?;
        Ok(record.into_outcome())
    }
}
