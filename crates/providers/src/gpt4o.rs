//! GPT-4o image task API.
//!
//! `POST /api/v1/gpt4o-image/generate` queues a task;
//! `GET /api/v1/gpt4o-image/record-info?taskId=` reports
//! `status` (`GENERATING`, `SUCCESS`, `CREATE_TASK_FAILED`,
//! `GENERATE_FAILED`), a fractional `progress` string and
//! `response.resultUrls`.

use colorbook_core::job::{JobResult, PollOutcome};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::http::{progress_value, read_envelope};

/// HTTP client for the GPT-4o image endpoints.
pub struct Gpt4oImageApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    prompt: &'a str,
    size: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    files_url: Option<Vec<&'a str>>,
    n_variants: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskCreated {
    task_id: String,
}

/// `data` of a record-info response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInfo {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress: Option<serde_json::Value>,
    #[serde(default)]
    pub response: Option<RecordResponse>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    #[serde(default)]
    pub result_urls: Option<Vec<String>>,
}

impl RecordInfo {
    /// Translate the native record into the normalized outcome.
    ///
    /// An unknown status string is treated as still running; the poller's
    /// attempt ceiling bounds how long that can last.
    pub fn into_outcome(self) -> PollOutcome {
        match self.status.as_deref() {
            Some("SUCCESS") => PollOutcome::succeeded(
                self.response
                    .and_then(|r| r.result_urls)
                    .and_then(|urls| urls.into_iter().find(|u| !u.trim().is_empty()))
                    .map(JobResult::url),
            ),
            Some("CREATE_TASK_FAILED") | Some("GENERATE_FAILED") => {
                PollOutcome::failed(self.error_message)
            }
            _ => PollOutcome::in_progress(self.progress.as_ref().and_then(progress_value)),
        }
    }
}

/// GPT-4o only renders square, landscape 3:2 and portrait 2:3.
pub fn size_for_aspect_ratio(ratio: &str) -> &'static str {
    match ratio {
        "1:1" => "1:1",
        "3:2" | "4:3" | "16:9" => "3:2",
        _ => "2:3",
    }
}

impl Gpt4oImageApi {
    /// * `base_url` - e.g. `https://api.kie.ai`.
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Queue a generation. `source_image` turns it into image-to-image.
    pub async fn generate(
        &self,
        prompt: &str,
        aspect_ratio: &str,
        source_image: Option<&str>,
    ) -> Result<String, ProviderError> {
        let body = GenerateRequest {
            prompt,
            size: size_for_aspect_ratio(aspect_ratio),
            files_url: source_image.map(|url| vec![url]),
            n_variants: 1,
        };

        let response = self
            .client
            .post(format!("{}/api/v1/gpt4o-image/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let created: TaskCreated = read_envelope(response).await?;
        Ok(created.task_id)
    }

    /// Fetch the status record of a queued task.
    pub async fn record_info(&self, task_id: &str) -> Result<PollOutcome, ProviderError> {
        let response = self
            .client
            .get(format!("{}/api/v1/gpt4o-image/record-info", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("taskId", task_id)])
            .send()
            .await?;

        let info: RecordInfo = read_envelope(response).await?;
        Ok(info.into_outcome())
    }
}
