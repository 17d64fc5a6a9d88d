//! Clients for the external AI task services.
//!
//! Every backend is reduced to the same contract, [`TaskProvider`]:
//! submit a job and get a task handle (or an immediate result), then
//! query that handle for a normalized [`PollOutcome`]. Image backends
//! with different native response shapes live behind
//! [`image::ImageProvider`]; text work goes through an OpenAI-compatible
//! chat model ([`text::TextClient`]), which also implements
//! [`Translator`] for bulk translation.
//!
//! [`PollOutcome`]: colorbook_core::job::PollOutcome

pub mod config;
pub mod error;
pub mod flux;
pub mod gpt4o;
pub mod http;
pub mod hub;
pub mod image;
pub mod task;
pub mod text;

pub use config::ProviderConfig;
pub use error::ProviderError;
pub use hub::ProviderHub;
pub use task::{Submission, TaskProvider};
pub use text::{TextClient, TranslationItem, TranslationMap, Translator};
