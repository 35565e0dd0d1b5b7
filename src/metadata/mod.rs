//! Video metadata persistence.

pub mod memory;
pub mod sqlite;
pub mod store;

pub use store::{MetadataStore, VideoRecord};
