//! In-memory metadata store.
//!
//! Stores all records in memory with no persistence. Useful for testing
//! and ephemeral deployments. Uses `RwLock<HashMap>` for thread-safe access.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;
use uuid::Uuid;

use super::store::{MetadataStore, VideoRecord};

#[derive(Default)]
pub struct MemoryMetadataStore {
    videos: RwLock<HashMap<Uuid, VideoRecord>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn create_video(
        &self,
        record: &VideoRecord,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let record = record.clone();
        Box::pin(async move {
            let mut videos = self.videos.write().expect("rwlock poisoned");
            if videos.contains_key(&record.id) {
                anyhow::bail!("video {} already exists", record.id);
            }
            videos.insert(record.id, record);
            Ok(())
        })
    }

    fn get_video(
        &self,
        id: Uuid,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<VideoRecord>>> + Send + '_>> {
        Box::pin(async move {
            let videos = self.videos.read().expect("rwlock poisoned");
            Ok(videos.get(&id).cloned())
        })
    }

    fn update_video(
        &self,
        record: &VideoRecord,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let record = record.clone();
        Box::pin(async move {
            let mut videos = self.videos.write().expect("rwlock poisoned");
            match videos.get_mut(&record.id) {
                Some(existing) => {
                    *existing = record;
                    Ok(())
                }
                None => anyhow::bail!("video {} not found", record.id),
            }
        })
    }

    fn list_videos(
        &self,
        user_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<VideoRecord>>> + Send + '_>> {
        Box::pin(async move {
            let videos = self.videos.read().expect("rwlock poisoned");
            let mut owned: Vec<VideoRecord> = videos
                .values()
                .filter(|v| v.user_id == user_id)
                .cloned()
                .collect();
            owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(owned)
        })
    }
}
