//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod category_repo;
pub mod content_item_repo;
pub mod tag_repo;

pub use category_repo::CategoryRepo;
pub use content_item_repo::ContentItemRepo;
pub use tag_repo::TagRepo;
