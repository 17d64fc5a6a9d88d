//! Errors from the provider layer.

use colorbook_core::job::JobType;

/// Errors raised while talking to an external AI service.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered but refused the request (bad params, quota,
    /// unknown task, non-success envelope code).
    #[error("Provider rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status, or the envelope `code` when the HTTP layer said 200.
        status: u16,
        message: String,
    },

    /// The provider answered with something we cannot interpret.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// The configured backend cannot run this job type.
    #[error("{0} is not supported by this provider")]
    Unsupported(JobType),
}

impl ProviderError {
    /// Whether retrying the same request later may succeed.
    ///
    /// Transport failures, throttling and server-side errors are retryable;
    /// rejections and malformed payloads are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::Malformed(_) | Self::Unsupported(_) => false,
        }
    }
}
