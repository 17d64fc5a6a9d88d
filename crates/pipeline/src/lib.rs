//! Asynchronous job pipeline: registry, polling drivers and batches.
//!
//! [`JobRegistry`] keeps at most one live job per `(subject_key,
//! job_type)` and runs each job on its own tokio task that submits to a
//! [`TaskProvider`](colorbook_providers::TaskProvider) and polls until a
//! terminal state. [`BatchCoordinator`] fans a list of subjects out into
//! individual jobs and aggregates their progress from [`JobEvent`]s.

pub mod batch;
pub mod config;
pub mod events;
mod poller;
pub mod registry;

pub use batch::{BatchCoordinator, BatchItem, BatchStatus, SubjectStatus};
pub use config::PollingConfig;
pub use events::JobEvent;
pub use registry::JobRegistry;
