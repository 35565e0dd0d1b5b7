//! Request-scoped staging of uploaded files on local disk.
//!
//! A [`StagedFile`] owns both the open handle and the path guard of a
//! temporary file.  Dropping it closes the handle and then unlinks the
//! path, on every exit path of the request.

use std::io::{self, SeekFrom};
use std::path::Path;
use tempfile::TempPath;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::storage::ObjectBody;

/// A temporary upload file.
pub struct StagedFile {
    // Declared before `path`: fields drop in order, so the handle is closed
    // before the file is unlinked.
    file: tokio::fs::File,
    path: TempPath,
    len: u64,
}

impl StagedFile {
    /// Create an empty staged file named `tubely-upload-*<suffix>` in `dir`.
    pub fn create(dir: &Path, suffix: &str) -> io::Result<Self> {
        let (file, path) = tempfile::Builder::new()
            .prefix("tubely-upload-")
            .suffix(suffix)
            .tempfile_in(dir)?
            .into_parts();
        Ok(Self {
            file: tokio::fs::File::from_std(file),
            path,
            len: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a chunk at the current position.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.len += chunk.len() as u64;
        Ok(())
    }

    /// Flush buffered writes so other processes see the full contents.
    pub async fn flush(&mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.file.sync_data().await
    }

    /// Seek back to offset 0 for the read-through copy.
    pub async fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }

    /// A second handle sharing this file's offset, for streaming the
    /// contents to an object store.  Call [`rewind`](Self::rewind) first.
    pub async fn body(&self) -> io::Result<ObjectBody> {
        Ok(ObjectBody::File {
            file: self.file.try_clone().await?,
            len: self.len,
        })
    }
}
