//! # Image Store
//!
//! Product pictures and contact profile pictures live as files under one
//! directory; rows keep only the relative path (`item_image_url`,
//! `profile_url`).
//!
//! Deleting a product or contact removes its blob when the row carries a
//! non-empty path. A blob that is already gone is not an error.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ImageStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a stored path under the store root.
    ///
    /// Absolute paths and `..` segments are refused.
    pub fn resolve(&self, stored: &str) -> DbResult<PathBuf> {
        let relative = Path::new(stored.trim());

        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(DbError::Storage(format!(
                "image path '{}' is outside the image directory",
                stored
            )));
        }

        Ok(self.root.join(relative))
    }

    /// Stores bytes under `stored` and returns the path to keep on the row.
    pub async fn put(&self, stored: &str, bytes: &[u8]) -> DbResult<String> {
        let path = self.resolve(stored)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        debug!(path = %path.display(), size = bytes.len(), "Stored image");
        Ok(stored.trim().to_string())
    }

    /// Removes the blob at `stored`. Blank paths are ignored.
    pub async fn remove(&self, stored: Option<&str>) -> DbResult<()> {
        let stored = match stored.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return Ok(()),
        };

        let path = self.resolve(stored)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed image");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Image already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        let stored = store.put("items/soap.png", b"png").await.unwrap();
        let path = dir.path().join("items/soap.png");
        assert!(path.exists());

        store.remove(Some(&stored)).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_remove_missing_or_blank_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        store.remove(None).await.unwrap();
        store.remove(Some("   ")).await.unwrap();
        store.remove(Some("items/never.png")).await.unwrap();
    }

    #[test]
    fn test_resolve_refuses_escape() {
        let store = ImageStore::new("/var/despos/images");

        assert!(store.resolve("../etc/passwd").is_err());
        assert!(store.resolve("/etc/passwd").is_err());
        assert!(store.resolve("items/a.png").is_ok());
    }
}
