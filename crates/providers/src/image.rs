//! One image-generation capability over several backends.
//!
//! [`ImageProvider`] is a tagged variant per backend. Each variant builds
//! its own request and maps its own response into a [`PollOutcome`]; the
//! caller never branches on which backend it is talking to.

use colorbook_core::content::{DEFAULT_ASPECT_RATIO, DEFAULT_OUTPUT_FORMAT};
use colorbook_core::job::{Backend, JobType, PollOutcome, ProviderTask};
use colorbook_core::params::{ImageModel, JobParams};

use crate::error::ProviderError;
use crate::flux::FluxKontextApi;
use crate::gpt4o::Gpt4oImageApi;

/// Style suffix appended to text-to-image prompts.
const LINE_ART_STYLE: &str = "Black and white line art coloring page for kids, clean bold outlines, \
     no shading, no color fill, plain white background.";

/// Instruction used for colorization when the caller gives none.
const DEFAULT_COLORING_PROMPT: &str = "Color this line art illustration with vibrant, harmonious colors. \
     Keep every original outline and the composition unchanged.";

/// Image backend selected for a job.
pub enum ImageProvider {
    Gpt4o(Gpt4oImageApi),
    Flux {
        api: FluxKontextApi,
        model: ImageModel,
    },
}

impl ImageProvider {
    pub fn backend(&self) -> Backend {
        match self {
            Self::Gpt4o(_) => Backend::Gpt4oImage,
            Self::Flux { .. } => Backend::FluxKontext,
        }
    }

    /// Queue an image job and return its provider handle.
    pub async fn submit(
        &self,
        job_type: JobType,
        params: &JobParams,
    ) -> Result<ProviderTask, ProviderError> {
        let prompt = image_prompt(job_type, params)?;
        let aspect_ratio = params
            .aspect_ratio
            .as_deref()
            .unwrap_or(DEFAULT_ASPECT_RATIO);
        let source = match job_type {
            JobType::ImageToImage | JobType::Colorization => params.image_url.as_deref(),
            _ => None,
        };

        let task_id = match self {
            Self::Gpt4o(api) => api.generate(&prompt, aspect_ratio, source).await?,
            Self::Flux { api, model } => {
                let output_format = params
                    .output_format
                    .as_deref()
                    .unwrap_or(DEFAULT_OUTPUT_FORMAT);
                api.generate(model.as_str(), &prompt, aspect_ratio, output_format, source)
                    .await?
            }
        };

        tracing::debug!(
            backend = ?self.backend(),
            job_type = %job_type,
            task_id = %task_id,
            "Image task accepted",
        );

        Ok(ProviderTask {
            backend: self.backend(),
            task_id,
        })
    }

    pub async fn query(&self, task_id: &str) -> Result<PollOutcome, ProviderError> {
        match self {
            Self::Gpt4o(api) => api.record_info(task_id).await,
            Self::Flux { api, .. } => api.record_info(task_id).await,
        }
    }
}

/// Build the prompt actually sent to an image backend.
pub fn image_prompt(job_type: JobType, params: &JobParams) -> Result<String, ProviderError> {
    match job_type {
        JobType::TextToImage => {
            let prompt = params
                .prompt_text()
                .ok_or_else(|| ProviderError::Malformed("text-to-image without prompt".into()))?;
            Ok(format!("{prompt}. {LINE_ART_STYLE}"))
        }
        JobType::ImageToImage => Ok(match params.prompt_text() {
            Some(prompt) => format!("{prompt}. {LINE_ART_STYLE}"),
            None => format!("Redraw this image as a coloring page. {LINE_ART_STYLE}"),
        }),
        JobType::Colorization => Ok(params
            .prompt_text()
            .unwrap_or(DEFAULT_COLORING_PROMPT)
            .to_string()),
        other => Err(ProviderError::Unsupported(other)),
    }
}
