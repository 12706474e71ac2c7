//! Error types for cloudshelf.

use thiserror::Error;

use crate::storage::ObjectStoreError;

/// Common error type for cloudshelf.
#[derive(Error, Debug)]
pub enum CloudshelfError {
    /// Structurally unsafe path (doubled separator, forbidden characters, `.`/`..` segments).
    #[error("path not valid: {0}")]
    PathNotValid(String),

    /// Search query rejected before any backend call.
    #[error("query not valid: {0}")]
    QueryNotValid(String),

    /// The target of an operation does not exist.
    #[error("resource {0} not found")]
    ResourceNotFound(String),

    /// Destination collision on create, move or upload.
    #[error("resource {0} already exists")]
    ResourceAlreadyExist(String),

    /// Uploaded payload has zero length.
    #[error("resource {0} is empty")]
    EmptyResource(String),

    /// Upload request exceeds the configured size limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Malformed multipart upload body.
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any failure of the underlying object store.
    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),

    /// Zip archive assembly failed.
    #[error("archive error: {0}")]
    Archive(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<async_zip::error::ZipError> for CloudshelfError {
    fn from(e: async_zip::error::ZipError) -> Self {
        CloudshelfError::Archive(e.to_string())
    }
}

/// Result type alias for cloudshelf operations.
pub type Result<T> = std::result::Result<T, CloudshelfError>;
