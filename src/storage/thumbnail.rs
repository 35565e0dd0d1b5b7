//! Thumbnail storage strategies.
//!
//! A thumbnail upload ends up as a URL written into the video record.  How
//! the bytes behind that URL are kept is chosen once at startup:
//!
//! * `local_disk`: a file under the assets directory served at `/assets`.
//! * `remote_object`: an object in the remote object store.
//! * `inline_data`: a `data:` URL carried by the record itself.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::backend::{ObjectBody, ObjectStore};
use super::local::LocalAssetStore;
use crate::config::ThumbnailsConfig;
use crate::keys::{generate_key, KeyEncoding};

/// Where a stored thumbnail physically lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailLocation {
    /// `previous` holds a backup of the file this upload replaced.
    LocalFile {
        name: String,
        previous: Option<PathBuf>,
    },
    RemoteObject { bucket: String, key: String },
    Inline,
}

/// Result of storing a thumbnail.
#[derive(Debug, Clone)]
pub struct StoredThumbnail {
    /// Value for the record's `thumbnail_url`.
    pub url: String,
    pub location: ThumbnailLocation,
}

/// A validated thumbnail ready to be stored.
pub struct ThumbnailUpload {
    pub video_id: Uuid,
    /// Media type essence, e.g. `image/png`.
    pub media_type: String,
    pub extension: &'static str,
    pub data: Bytes,
}

/// Strategy for persisting thumbnail bytes.
pub trait ThumbnailStore: Send + Sync + 'static {
    /// Largest payload this strategy accepts.
    fn max_bytes(&self) -> usize;

    fn store(
        &self,
        upload: ThumbnailUpload,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<StoredThumbnail>> + Send + '_>>;

    /// Finish a `store` whose record update succeeded.
    fn commit<'a>(
        &'a self,
        _stored: &'a StoredThumbnail,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    /// Undo a `store` whose record update failed. Only local state written
    /// by that `store` is rolled back; remote objects are left in place.
    fn discard<'a>(
        &'a self,
        stored: &'a StoredThumbnail,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// Join a public base URL and a stored name.
fn public_url(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// Naming scheme for files written by [`LocalDiskThumbnails`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailNaming {
    /// `<video-id>.<ext>`; a new upload replaces the previous file once
    /// the record update succeeds.
    VideoId,
    /// Fresh random name per upload.
    Random,
}

pub struct LocalDiskThumbnails {
    assets: LocalAssetStore,
    naming: ThumbnailNaming,
    base_url: String,
    max_bytes: usize,
}

impl LocalDiskThumbnails {
    pub fn new(
        assets: LocalAssetStore,
        naming: ThumbnailNaming,
        base_url: impl Into<String>,
        max_bytes: usize,
    ) -> Self {
        Self {
            assets,
            naming,
            base_url: base_url.into(),
            max_bytes,
        }
    }
}

impl ThumbnailStore for LocalDiskThumbnails {
    fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn store(
        &self,
        upload: ThumbnailUpload,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<StoredThumbnail>> + Send + '_>> {
        Box::pin(async move {
            let (name, previous) = match self.naming {
                ThumbnailNaming::VideoId => {
                    let name = format!("{}.{}", upload.video_id, upload.extension);
                    let previous = self.assets.backup(&name).await?;
                    (name, previous)
                }
                ThumbnailNaming::Random => (
                    generate_key(KeyEncoding::UrlSafeBase64, upload.extension)?,
                    None,
                ),
            };
            if let Err(e) = self.assets.write(&name, &upload.data).await {
                if let Some(backup) = &previous {
                    self.assets.drop_backup(backup).await?;
                }
                return Err(e);
            }
            Ok(StoredThumbnail {
                url: public_url(&self.base_url, &name),
                location: ThumbnailLocation::LocalFile { name, previous },
            })
        })
    }

    fn commit<'a>(
        &'a self,
        stored: &'a StoredThumbnail,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if let ThumbnailLocation::LocalFile {
                previous: Some(backup),
                ..
            } = &stored.location
            {
                self.assets.drop_backup(backup).await?;
            }
            Ok(())
        })
    }

    fn discard<'a>(
        &'a self,
        stored: &'a StoredThumbnail,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            match &stored.location {
                ThumbnailLocation::LocalFile {
                    name,
                    previous: Some(backup),
                } => {
                    self.assets.restore(name, backup).await?;
                    info!(name = %name, "restored previous local thumbnail");
                }
                ThumbnailLocation::LocalFile {
                    name,
                    previous: None,
                } => {
                    self.assets.remove(name).await?;
                    info!(name = %name, "discarded local thumbnail");
                }
                _ => {}
            }
            Ok(())
        })
    }
}

pub struct RemoteObjectThumbnails {
    objects: Arc<dyn ObjectStore>,
    bucket: String,
    base_url: String,
    max_bytes: usize,
}

impl RemoteObjectThumbnails {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        base_url: impl Into<String>,
        max_bytes: usize,
    ) -> Self {
        Self {
            objects,
            bucket: bucket.into(),
            base_url: base_url.into(),
            max_bytes,
        }
    }
}

impl ThumbnailStore for RemoteObjectThumbnails {
    fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn store(
        &self,
        upload: ThumbnailUpload,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<StoredThumbnail>> + Send + '_>> {
        Box::pin(async move {
            let key = generate_key(KeyEncoding::UrlSafeBase64, upload.extension)?;
            self.objects
                .put_object(
                    &self.bucket,
                    &key,
                    ObjectBody::Bytes(upload.data),
                    &upload.media_type,
                )
                .await?;
            Ok(StoredThumbnail {
                url: public_url(&self.base_url, &key),
                location: ThumbnailLocation::RemoteObject {
                    bucket: self.bucket.clone(),
                    key,
                },
            })
        })
    }

    fn discard<'a>(
        &'a self,
        stored: &'a StoredThumbnail,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if let ThumbnailLocation::RemoteObject { bucket, key } = &stored.location {
                warn!(bucket = %bucket, key = %key, "orphaned remote thumbnail");
            }
            Ok(())
        })
    }
}

pub struct InlineDataThumbnails {
    max_bytes: usize,
}

impl InlineDataThumbnails {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl ThumbnailStore for InlineDataThumbnails {
    fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn store(
        &self,
        upload: ThumbnailUpload,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<StoredThumbnail>> + Send + '_>> {
        Box::pin(async move {
            let payload = STANDARD.encode(&upload.data);
            Ok(StoredThumbnail {
                url: format!("data:{};base64,{payload}", upload.media_type),
                location: ThumbnailLocation::Inline,
            })
        })
    }

    fn discard<'a>(
        &'a self,
        _stored: &'a StoredThumbnail,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}

/// Build the configured strategy.
pub fn from_config(
    cfg: &ThumbnailsConfig,
    max_upload_bytes: usize,
    objects: Arc<dyn ObjectStore>,
) -> anyhow::Result<Arc<dyn ThumbnailStore>> {
    let store: Arc<dyn ThumbnailStore> = match cfg.strategy.as_str() {
        "local_disk" => {
            let naming = match cfg.naming.as_str() {
                "video_id" => ThumbnailNaming::VideoId,
                "random" => ThumbnailNaming::Random,
                other => anyhow::bail!("unknown thumbnail naming: {other}"),
            };
            Arc::new(LocalDiskThumbnails::new(
                LocalAssetStore::new(&cfg.assets_root)?,
                naming,
                &cfg.public_base_url,
                max_upload_bytes,
            ))
        }
        "remote_object" => Arc::new(RemoteObjectThumbnails::new(
            objects,
            &cfg.bucket,
            &cfg.public_base_url,
            max_upload_bytes,
        )),
        "inline_data" => Arc::new(InlineDataThumbnails::new(
            cfg.max_inline_bytes.min(max_upload_bytes),
        )),
        other => anyhow::bail!("unknown thumbnail strategy: {other}"),
    };
    info!(strategy = %cfg.strategy, "thumbnail storage initialized");
    Ok(store)
}
