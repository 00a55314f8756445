use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::fs::FsBlobStore;
use crate::memory::InMemoryBlobStore;
use crate::traits::BlobStore;

/// Directory under which bucket directories are created by default.
pub const DEFAULT_ROOT: &str = "data";

/// Bucket used when none is configured.
pub const DEFAULT_BUCKET: &str = "docket";

/// Which blob store backend to open, as selected by configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store; contents are lost on exit.
    Memory,
    /// One directory per bucket under `root`.
    Fs { root: PathBuf, bucket: String },
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::Fs {
            root: PathBuf::from(DEFAULT_ROOT),
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }
}

impl StoreBackend {
    /// Instantiate the configured backend.
    pub fn open(&self) -> StoreResult<Arc<dyn BlobStore>> {
        match self {
            StoreBackend::Memory => Ok(Arc::new(InMemoryBlobStore::new())),
            StoreBackend::Fs { root, bucket } => Ok(Arc::new(FsBlobStore::new(root, bucket)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_memory() {
        let store = StoreBackend::Memory.open().unwrap();
        assert_eq!(store.describe(), "memory");
    }

    #[test]
    fn opens_fs() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StoreBackend::Fs {
            root: dir.path().to_path_buf(),
            bucket: "orders".into(),
        };
        let store = backend.open().unwrap();
        assert!(store.describe().contains("orders"));
    }

    #[test]
    fn fs_with_bad_bucket_fails() {
        let backend = StoreBackend::Fs {
            root: PathBuf::from("."),
            bucket: String::new(),
        };
        assert!(backend.open().is_err());
    }

    #[test]
    fn serde_tagged_form() {
        let json = serde_json::to_value(StoreBackend::Memory).unwrap();
        assert_eq!(json["backend"], "memory");

        let parsed: StoreBackend =
            serde_json::from_str(r#"{"backend":"fs","root":"/srv","bucket":"b"}"#).unwrap();
        assert_eq!(
            parsed,
            StoreBackend::Fs { root: PathBuf::from("/srv"), bucket: "b".into() }
        );
    }
}
