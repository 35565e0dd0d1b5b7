//! Local filesystem asset directory.
//!
//! Thumbnails stored with the `local_disk` strategy live as flat files
//! under a root directory that the server exposes at `/assets`.  Names are
//! single path components; anything that could escape the root is refused.
//!
//! All writes follow crash-only design: write to temp file, fsync, rename.
//! Temp files live in a hidden sibling of the root so they are never served.

use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Flat directory of publicly served files.
pub struct LocalAssetStore {
    /// Root directory for all stored files.
    root: PathBuf,
    /// Scratch directory beside the root, on the same filesystem.
    tmp_dir: PathBuf,
}

impl LocalAssetStore {
    /// Create a new store rooted at `root`.
    ///
    /// The root and its `.<name>.tmp` sibling are created if missing.
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let absolute = std::fs::canonicalize(&root)?;
        let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name()) else {
            anyhow::bail!("assets root must not be the filesystem root: {}", root.display());
        };
        let tmp_dir = parent.join(format!(".{}.tmp", name.to_string_lossy()));
        std::fs::create_dir_all(&tmp_dir)?;
        Ok(Self { root, tmp_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Resolve a file name to a path inside the root.
    fn resolve(&self, name: &str) -> anyhow::Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if !name.starts_with('.') => {
                Ok(self.root.join(part))
            }
            _ => anyhow::bail!("asset name must be a single plain path component: {name:?}"),
        }
    }

    /// Generate a fresh path in the scratch directory.
    fn temp_path(&self) -> PathBuf {
        let id = uuid::Uuid::new_v4();
        self.tmp_dir.join(format!("tmp-{id}"))
    }

    /// Write `data` as `name`, replacing any existing file.
    pub async fn write(&self, name: &str, data: &[u8]) -> anyhow::Result<PathBuf> {
        let final_path = self.resolve(name)?;
        let tmp_path = self.temp_path();

        let result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &final_path).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(final_path)
    }

    /// Remove `name`. Missing files are not an error.
    pub async fn remove(&self, name: &str) -> anyhow::Result<()> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Hard-link the current contents of `name` into the scratch directory.
    ///
    /// The live file stays in place; a later [`write`](Self::write) replaces
    /// it without touching the backup.  Returns `None` when `name` does not
    /// exist.
    pub async fn backup(&self, name: &str) -> anyhow::Result<Option<PathBuf>> {
        let path = self.resolve(name)?;
        let backup = self.temp_path();
        match tokio::fs::hard_link(&path, &backup).await {
            Ok(()) => Ok(Some(backup)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Put a backup taken by [`backup`](Self::backup) back as `name`.
    pub async fn restore(&self, name: &str, backup: &Path) -> anyhow::Result<()> {
        let path = self.resolve(name)?;
        tokio::fs::rename(backup, &path).await?;
        Ok(())
    }

    /// Delete a backup that is no longer needed.
    pub async fn drop_backup(&self, backup: &Path) -> anyhow::Result<()> {
        match tokio::fs::remove_file(backup).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, LocalAssetStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalAssetStore::new(dir.path().join("assets")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let (_dir, store) = test_store();
        let path = store.write("thumb.png", b"png bytes").await.unwrap();
        assert_eq!(path, store.root().join("thumb.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png bytes");
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let (_dir, store) = test_store();
        store.write("a.jpg", b"first").await.unwrap();
        let path = store.write("a.jpg", b"second").await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let (_dir, store) = test_store();
        store.write("a.gif", b"gif").await.unwrap();
        let leftovers = std::fs::read_dir(store.tmp_dir()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_scratch_dir_is_outside_root() {
        let (dir, store) = test_store();
        assert_eq!(
            store.tmp_dir(),
            std::fs::canonicalize(dir.path()).unwrap().join(".assets.tmp")
        );
        assert!(!store.tmp_dir().starts_with(std::fs::canonicalize(store.root()).unwrap()));
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_backup_survives_overwrite_and_restores() {
        let (_dir, store) = test_store();
        store.write("v.png", b"old").await.unwrap();
        let backup = store.backup("v.png").await.unwrap().unwrap();
        store.write("v.png", b"new").await.unwrap();
        assert_eq!(std::fs::read(store.root().join("v.png")).unwrap(), b"new");

        store.restore("v.png", &backup).await.unwrap();
        assert_eq!(std::fs::read(store.root().join("v.png")).unwrap(), b"old");
        assert_eq!(std::fs::read_dir(store.tmp_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_backup_of_missing_file_is_none() {
        let (_dir, store) = test_store();
        assert!(store.backup("absent.png").await.unwrap().is_none());

        store.write("a.png", b"x").await.unwrap();
        let backup = store.backup("a.png").await.unwrap().unwrap();
        store.drop_backup(&backup).await.unwrap();
        assert!(!backup.exists());
        assert!(store.root().join("a.png").exists());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_dir, store) = test_store();
        store.write("a.png", b"x").await.unwrap();
        store.remove("a.png").await.unwrap();
        assert!(!store.root().join("a.png").exists());
        store.remove("a.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (_dir, store) = test_store();
        assert!(store.write("../escape.png", b"x").await.is_err());
        assert!(store.write("nested/name.png", b"x").await.is_err());
        assert!(store.write("/abs.png", b"x").await.is_err());
        assert!(store.write(".hidden", b"x").await.is_err());
        assert!(store.write("", b"x").await.is_err());
    }
}
