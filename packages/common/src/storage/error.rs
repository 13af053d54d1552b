use thiserror::Error;

/// Errors that can occur during object storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The object key is malformed or escapes the store root.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// The object exceeds the configured size limit.
    #[error("object exceeds size limit ({actual} > {limit} bytes)")]
    SizeLimitExceeded { actual: u64, limit: u64 },

    /// The remote backend rejected or failed the request.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The call did not complete within the configured deadline.
    #[error("storage operation timed out after {0}s")]
    Timeout(u64),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
