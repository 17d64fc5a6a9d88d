use colorbook_core::params::ImageModel;

/// Credentials and endpoints for the external AI services.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Root of the image task service (default: `https://api.kie.ai`).
    pub ai_base_url: String,
    pub ai_api_key: String,
    /// OpenAI-compatible API root (default: `https://api.openai.com/v1`).
    pub text_base_url: String,
    pub text_api_key: String,
    /// Chat model used for text jobs (default: `gpt-4o-mini`).
    pub text_model: String,
    /// Image model used when a job does not pick one (default: `gpt-4o`).
    pub default_image_model: ImageModel,
    /// Per-request timeout for provider calls in seconds (default: `60`).
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                       |
    /// |-------------------------|-------------------------------|
    /// | `AI_API_BASE_URL`       | `https://api.kie.ai`          |
    /// | `AI_API_KEY`            | empty                         |
    /// | `TEXT_API_BASE_URL`     | `https://api.openai.com/v1`   |
    /// | `TEXT_API_KEY`          | empty                         |
    /// | `TEXT_MODEL`            | `gpt-4o-mini`                 |
    /// | `DEFAULT_IMAGE_MODEL`   | `gpt-4o`                      |
    /// | `PROVIDER_TIMEOUT_SECS` | `60`                          |
    pub fn from_env() -> Self {
        let ai_api_key = std::env::var("AI_API_KEY").unwrap_or_default();
        if ai_api_key.is_empty() {
            tracing::warn!("AI_API_KEY is not set; image jobs will be rejected upstream");
        }

        let default_image_model = std::env::var("DEFAULT_IMAGE_MODEL")
            .ok()
            .map(|name| {
                ImageModel::from_name(name.trim())
                    .expect("DEFAULT_IMAGE_MODEL must be a known image model")
            })
            .unwrap_or_default();

        let timeout_secs: u64 = std::env::var("PROVIDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("PROVIDER_TIMEOUT_SECS must be a valid u64");

        Self {
            ai_base_url: std::env::var("AI_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.kie.ai".into()),
            ai_api_key,
            text_base_url: std::env::var("TEXT_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            text_api_key: std::env::var("TEXT_API_KEY").unwrap_or_default(),
            text_model: std::env::var("TEXT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
            default_image_model,
            timeout_secs,
        }
    }
}
