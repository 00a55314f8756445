use async_trait::async_trait;

use crate::error::StoreResult;

/// Key-addressed blob storage backing collection persistence.
///
/// All implementations must satisfy these invariants:
/// - `put` replaces the whole blob stored under `key`; there are no partial
///   writes visible to a later `get`.
/// - A missing blob is reported as `Ok(None)`, never as an error.
/// - The store never interprets blob contents.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the blob stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing has been written under that key yet.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `bytes` under `key`, replacing any previous blob.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()>;

    /// Reject keys this store cannot address, without touching storage.
    ///
    /// Callers run this before the first `get` or `put` so that an unusable
    /// key is reported as a caller error rather than as a storage failure.
    fn check_key(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }

    /// Human-readable location of the store, used in log lines.
    fn describe(&self) -> String;
}
