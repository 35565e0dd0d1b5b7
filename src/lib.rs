//! Tubely library: video hosting API.
//!
//! This crate provides the upload pipeline for videos and thumbnails,
//! media probing, object key generation, signed playback URLs, and the
//! pluggable metadata and object stores behind them.

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod keys;
pub mod media;
pub mod metadata;
pub mod metrics;
pub mod server;
pub mod signing;
pub mod staging;
pub mod storage;

use crate::config::Config;
use crate::media::MediaProber;
use crate::metadata::MetadataStore;
use crate::storage::{ObjectStore, ThumbnailStore};

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Validated configuration.
    pub config: Config,
    /// Video metadata store (SQLite or memory).
    pub metadata: Arc<dyn MetadataStore>,
    /// Remote object store for video files (S3 or memory).
    pub objects: Arc<dyn ObjectStore>,
    /// Thumbnail storage strategy.
    pub thumbnails: Arc<dyn ThumbnailStore>,
    /// Reports video dimensions for aspect-ratio classification.
    pub prober: Arc<dyn MediaProber>,
}
