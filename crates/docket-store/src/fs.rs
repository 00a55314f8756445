//! Filesystem-backed blob store.
//!
//! Each bucket is a directory under the store root and each blob is a single
//! file named after its key. Writes land in a temporary sibling file first and
//! are renamed into place, so readers only ever see complete blobs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::traits::BlobStore;

/// Suffix of in-flight temporary files.
const TMP_SUFFIX: &str = ".tmp";

/// A [`BlobStore`] that keeps one file per key inside `<root>/<bucket>/`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `root` using `bucket` as the blob directory.
    ///
    /// The directory is created lazily on the first write.
    pub fn new(root: impl AsRef<Path>, bucket: &str) -> StoreResult<Self> {
        validate_key(bucket)?;
        Ok(Self {
            dir: root.as_ref().join(bucket),
        })
    }

    /// Directory holding the blobs of this bucket.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }
}

/// Check that `key` maps onto exactly one file name inside the bucket.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let reason = if key.is_empty() {
        Some("must not be empty")
    } else if key.contains(['/', '\\', '\0']) {
        Some("must not contain path separators or NUL")
    } else if key.starts_with('.') {
        Some("must not start with '.'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.blob_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        let path = self.blob_path(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let tmp = self
            .dir
            .join(format!(".{key}.{}{TMP_SUFFIX}", uuid::Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::Io(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::Io(e));
        }

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "blob written");
        Ok(())
    }

    fn check_key(&self, key: &str) -> StoreResult<()> {
        validate_key(key)
    }

    fn describe(&self) -> String {
        format!("fs:{}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "bucket").unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn missing_blob_is_none() {
        let (_dir, store) = store();
        assert!(store.get("orders").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get() {
        let (_dir, store) = store();
        store.put("orders", b"{\"a\": 1}".to_vec()).await.unwrap();
        let bytes = store.get("orders").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[tokio::test]
    async fn put_replaces_and_leaves_no_temp_files() {
        let (_dir, store) = store();
        store.put("orders", b"first".to_vec()).await.unwrap();
        store.put("orders", b"second".to_vec()).await.unwrap();
        assert_eq!(store.get("orders").await.unwrap().unwrap(), b"second");

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(store.dir()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["orders".to_string()]);
    }

    #[tokio::test]
    async fn buckets_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let a = FsBlobStore::new(dir.path(), "a").unwrap();
        let b = FsBlobStore::new(dir.path(), "b").unwrap();
        a.put("orders", b"x".to_vec()).await.unwrap();
        assert!(b.get("orders").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn traversal_keys_rejected() {
        let (_dir, store) = store();
        for key in ["", "../escape", "a/b", ".hidden", "..", "nul\0"] {
            let err = store.put(key, vec![]).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey { .. }), "key {key:?}");
        }
    }

    #[test]
    fn invalid_bucket_rejected() {
        assert!(FsBlobStore::new("/tmp", "../up").is_err());
    }

    #[test]
    fn check_key_matches_blob_rules() {
        let (dir, store) = store();
        assert!(store.check_key("orders").is_ok());
        for bad in [".orders", "a/b", "a\\b", ""] {
            assert!(matches!(store.check_key(bad), Err(StoreError::InvalidKey { .. })));
        }
        // Nothing was created on disk.
        assert!(!dir.path().join("bucket").exists());
    }

    #[test]
    fn describe_mentions_path() {
        let (_dir, store) = store();
        assert!(store.describe().starts_with("fs:"));
        assert!(store.describe().ends_with("bucket"));
    }
}
