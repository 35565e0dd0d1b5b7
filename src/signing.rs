//! Stored video locations and their conversion to signed playback URLs.
//!
//! A record's `video_url` holds `<bucket>,<key>` while at rest.  Read
//! paths swap it for a presigned URL just before the record leaves the
//! server; anything that does not decode is passed through untouched.

use std::fmt;
use std::time::Duration;

use crate::metadata::VideoRecord;
use crate::storage::ObjectStore;

const SEPARATOR: char = ',';

/// Bucket and key of a stored video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Decode `<bucket>,<key>`. Anything but exactly two non-empty parts
    /// is `None`.
    pub fn decode(raw: &str) -> Option<Self> {
        let mut parts = raw.split(SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(bucket), Some(key), None) if !bucket.is_empty() && !key.is_empty() => {
                Some(Self::new(bucket, key))
            }
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        format!("{}{SEPARATOR}{}", self.bucket, self.key)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Replace a record's stored location with a presigned URL valid for `ttl`.
///
/// Records with no location, or one that does not decode, come back as is.
pub async fn sign_video(
    store: &dyn ObjectStore,
    mut record: VideoRecord,
    ttl: Duration,
) -> anyhow::Result<VideoRecord> {
    let Some(location) = record.video_url.as_deref().and_then(ObjectLocation::decode) else {
        return Ok(record);
    };
    let url = store.presign_get(&location.bucket, &location.key, ttl).await?;
    record.video_url = Some(url);
    Ok(record)
}
