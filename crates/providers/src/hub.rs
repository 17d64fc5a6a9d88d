//! The production [`TaskProvider`]: routes each job to its backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use colorbook_core::job::{Backend, JobResult, JobType, PollOutcome, ProviderTask};
use colorbook_core::params::{ImageModel, JobParams};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::flux::FluxKontextApi;
use crate::gpt4o::Gpt4oImageApi;
use crate::image::ImageProvider;
use crate::task::{Submission, TaskProvider};
use crate::text::TextClient;

/// Routes image jobs to the selected image backend and runs text jobs
/// against the chat model.
pub struct ProviderHub {
    gpt4o: ImageProvider,
    flux_pro: ImageProvider,
    flux_max: ImageProvider,
    text: Arc<TextClient>,
    default_model: ImageModel,
}

impl ProviderHub {
    /// Build every backend from `config`, sharing one HTTP client.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let flux = |model| ImageProvider::Flux {
            api: FluxKontextApi::new(
                client.clone(),
                config.ai_base_url.clone(),
                config.ai_api_key.clone(),
            ),
            model,
        };

        Ok(Self {
            gpt4o: ImageProvider::Gpt4o(Gpt4oImageApi::new(
                client.clone(),
                config.ai_base_url.clone(),
                config.ai_api_key.clone(),
            )),
            flux_pro: flux(ImageModel::FluxKontextPro),
            flux_max: flux(ImageModel::FluxKontextMax),
            text: Arc::new(TextClient::new(
                client.clone(),
                config.text_base_url.clone(),
                config.text_api_key.clone(),
                config.text_model.clone(),
            )),
            default_model: config.default_image_model,
        })
    }

    /// The chat client, shared with the bulk translation endpoint.
    pub fn text_client(&self) -> Arc<TextClient> {
        Arc::clone(&self.text)
    }

    fn image_provider(&self, model: ImageModel) -> &ImageProvider {
        match model {
            ImageModel::Gpt4o => &self.gpt4o,
            ImageModel::FluxKontextPro => &self.flux_pro,
            ImageModel::FluxKontextMax => &self.flux_max,
        }
    }
}

#[async_trait]
impl TaskProvider for ProviderHub {
    async fn submit(
        &self,
        job_type: JobType,
        params: &JobParams,
    ) -> Result<Submission, ProviderError> {
        if job_type.is_image() {
            let model = params.image_model.unwrap_or(self.default_model);
            let task = self.image_provider(model).submit(job_type, params).await?;
            return Ok(Submission::Accepted(task));
        }

        let value = self.text.run(job_type, params).await?;
        let text = serde_json::to_string(&value)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok(Submission::Finished(PollOutcome::succeeded(Some(
            JobResult::text(text),
        ))))
    }

    async fn query(
        &self,
        job_type: JobType,
        task: &ProviderTask,
    ) -> Result<PollOutcome, ProviderError> {
        match task.backend {
            Backend::Gpt4oImage => self.gpt4o.query(&task.task_id).await,
            // Flux record lookups are model independent.
            Backend::FluxKontext => self.flux_pro.query(&task.task_id).await,
            Backend::Text => Err(ProviderError::Malformed(format!(
                "{job_type} text task {} cannot be polled",
                task.task_id
            ))),
        }
    }
}
