pub mod assets;
pub mod batches;
pub mod categories;
pub mod content;
pub mod jobs;
pub mod tags;
pub mod translate;
