//! Abstract video metadata store trait.
//!
//! Any metadata backend must implement [`MetadataStore`].  The trait
//! uses manually desugared async methods (pinned boxed futures) so it can
//! be held as `Arc<dyn MetadataStore>`.
//!
//! Updates replace the whole record.  There is no optimistic concurrency
//! token: concurrent updates of one record are last-writer-wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use utoipa::ToSchema;
use uuid::Uuid;

/// Metadata for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VideoRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub description: String,
    /// Public thumbnail URL or `data:` URL.
    pub thumbnail_url: Option<String>,
    /// Stored as `<bucket>,<key>`; replaced by a presigned URL on read paths.
    pub video_url: Option<String>,
    /// Owner. Fixed at creation.
    pub user_id: Uuid,
}

impl VideoRecord {
    /// A fresh record without thumbnail or video.
    pub fn new(user_id: Uuid, title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            title: title.into(),
            description: description.into(),
            thumbnail_url: None,
            video_url: None,
            user_id,
        }
    }
}

/// Async video metadata contract.
pub trait MetadataStore: Send + Sync + 'static {
    /// Insert a new record. Fails if the id already exists.
    fn create_video(
        &self,
        record: &VideoRecord,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Fetch a record by id.
    fn get_video(
        &self,
        id: Uuid,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<VideoRecord>>> + Send + '_>>;

    /// Replace an existing record. Fails if the id is unknown.
    fn update_video(
        &self,
        record: &VideoRecord,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// All records owned by `user_id`, newest first.
    fn list_videos(
        &self,
        user_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<VideoRecord>>> + Send + '_>>;
}
