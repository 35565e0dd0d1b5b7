//! Abstract remote object store trait.
//!
//! Every object store must implement [`ObjectStore`].  Writes are whole
//! objects addressed by `(bucket, key)`; reads happen out of band through
//! presigned URLs handed to clients.

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Payload of a [`ObjectStore::put_object`] call.
pub enum ObjectBody {
    /// An open file positioned at offset 0, streamed without buffering.
    File { file: tokio::fs::File, len: u64 },
    /// Bytes already held in memory.
    Bytes(Bytes),
}

impl ObjectBody {
    /// Declared size of the payload in bytes.
    pub fn len(&self) -> u64 {
        match self {
            ObjectBody::File { len, .. } => *len,
            ObjectBody::Bytes(data) => data.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Bytes> for ObjectBody {
    fn from(data: Bytes) -> Self {
        ObjectBody::Bytes(data)
    }
}

/// Async remote object storage contract.
pub trait ObjectStore: Send + Sync + 'static {
    /// Store `body` at `bucket`/`key` with the given content type,
    /// replacing any existing object.
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Produce a URL granting read access to `bucket`/`key` for `ttl`.
    fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>>;
}
