/// Errors from blob store operations.
///
/// A missing blob is not an error: [`crate::BlobStore::get`] reports it as
/// `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key cannot be used to address a blob in this backend.
    #[error("invalid blob key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend could not be reached or refused the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The stored bytes cannot be decoded into the expected shape.
    #[error("corrupt blob {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Encoding the outgoing payload failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
