//! In-memory object store.
//!
//! Objects are held in a `tokio::sync::RwLock<HashMap<...>>` keyed by
//! `(bucket, key)`.  Nothing survives a restart; this backend exists for
//! local development and tests.  Presigned URLs use a `memory://` scheme
//! that no client can dereference.

use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::backend::{ObjectBody, ObjectStore};

/// A stored object's bytes and declared content type.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

/// Object store backed by a hash map.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: tokio::sync::RwLock<HashMap<(String, String), StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored object, if present.
    pub async fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// All keys stored in `bucket`, sorted.
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let id = (bucket.to_string(), key.to_string());
        let content_type = content_type.to_string();
        Box::pin(async move {
            let data = match body {
                ObjectBody::Bytes(data) => data,
                ObjectBody::File { mut file, len } => {
                    let mut buf = Vec::with_capacity(len as usize);
                    file.read_to_end(&mut buf).await?;
                    if buf.len() as u64 != len {
                        anyhow::bail!("short read: expected {len} bytes, got {}", buf.len());
                    }
                    Bytes::from(buf)
                }
            };
            debug!(bucket = %id.0, key = %id.1, size = data.len(), "memory put_object");
            self.objects
                .write()
                .await
                .insert(id, StoredObject { data, content_type });
            Ok(())
        })
    }

    fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let url = format!("memory://{bucket}/{key}?X-Amz-Expires={}", ttl.as_secs());
        Box::pin(async move { Ok(url) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom, Write};

    #[tokio::test]
    async fn test_put_bytes_and_get() {
        let store = MemoryObjectStore::new();
        store
            .put_object("videos", "a.mp4", Bytes::from_static(b"hello").into(), "video/mp4")
            .await
            .unwrap();
        let obj = store.get("videos", "a.mp4").await.unwrap();
        assert_eq!(obj.data.as_ref(), b"hello");
        assert_eq!(obj.content_type, "video/mp4");
        assert!(store.get("other", "a.mp4").await.is_none());
    }

    #[tokio::test]
    async fn test_put_file_body() {
        let mut std_file = tempfile::tempfile().unwrap();
        std_file.write_all(b"file contents").unwrap();
        std_file.seek(SeekFrom::Start(0)).unwrap();
        let body = ObjectBody::File {
            file: tokio::fs::File::from_std(std_file),
            len: 13,
        };

        let store = MemoryObjectStore::new();
        store
            .put_object("videos", "landscape/b.mp4", body, "video/mp4")
            .await
            .unwrap();
        let obj = store.get("videos", "landscape/b.mp4").await.unwrap();
        assert_eq!(obj.data.as_ref(), b"file contents");
        assert_eq!(store.keys("videos").await, vec!["landscape/b.mp4".to_string()]);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryObjectStore::new();
        store
            .put_object("b", "k", Bytes::from_static(b"one").into(), "image/png")
            .await
            .unwrap();
        store
            .put_object("b", "k", Bytes::from_static(b"two").into(), "image/png")
            .await
            .unwrap();
        assert_eq!(store.get("b", "k").await.unwrap().data.as_ref(), b"two");
    }

    #[tokio::test]
    async fn test_presign_carries_ttl() {
        let store = MemoryObjectStore::new();
        let url = store
            .presign_get("videos", "x.mp4", Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(url, "memory://videos/x.mp4?X-Amz-Expires=3600");
    }
}
