use docket_store::StoreError;

/// Errors raised by collection operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Collection name is empty or whitespace-only.
    #[error("invalid collection name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Entry key is neither a string nor a number.
    #[error("invalid entry key: {0}")]
    InvalidKey(String),

    /// Search query is empty.
    #[error("invalid search query: {0}")]
    InvalidQuery(String),

    /// Loading the collection from the durable store failed for a reason
    /// other than the blob being absent. The collection stays unloaded and
    /// the next access retries.
    #[error("initialisation failed for collection={collection}: {source}")]
    Initialization {
        collection: String,
        #[source]
        source: StoreError,
    },

    /// Writing the collection back to the durable store failed. The cached
    /// state keeps the mutation.
    #[error("persisting collection={collection} failed: {source}")]
    Persist {
        collection: String,
        #[source]
        source: StoreError,
    },

    /// The scan aborted unexpectedly.
    #[error("search in collection={collection} failed: {reason}")]
    Search { collection: String, reason: String },
}

impl CoreError {
    /// Whether the error was caused by the caller's input rather than by
    /// the service or its storage.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidName { .. } | CoreError::InvalidKey(_) | CoreError::InvalidQuery(_)
        )
    }
}

/// Result alias for collection operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_client_errors() {
        assert!(CoreError::InvalidKey("null".into()).is_client_error());
        assert!(CoreError::InvalidQuery("empty".into()).is_client_error());
        assert!(CoreError::InvalidName { name: "".into(), reason: "empty".into() }
            .is_client_error());
    }

    #[test]
    fn storage_errors_are_server_errors() {
        let err = CoreError::Persist {
            collection: "orders".into(),
            source: StoreError::Unavailable("down".into()),
        };
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("collection=orders"));

        let err = CoreError::Search { collection: "orders".into(), reason: "panic".into() };
        assert!(!err.is_client_error());
    }
}
