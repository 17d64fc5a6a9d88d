//! Domain types shared by every colorbook crate.
//!
//! Holds the job model and its state machine, localized text, request
//! parameters and content validation. Nothing in here performs I/O.

pub mod assets;
pub mod content;
pub mod error;
pub mod i18n;
pub mod job;
pub mod params;
pub mod types;
