//! Storage: the remote object store for videos and the thumbnail strategies.

pub mod aws;
pub mod backend;
pub mod local;
pub mod memory;
pub mod thumbnail;

pub use backend::{ObjectBody, ObjectStore};
pub use thumbnail::ThumbnailStore;
