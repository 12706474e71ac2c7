//! Capability interface over the object store.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use thiserror::Error;
use tokio::io::AsyncRead;

/// Streamed object body.
pub type ByteStream = BoxStream<'static, Result<Bytes, ObjectStoreError>>;

/// Result type for gateway primitives.
pub type StorageResult<T> = Result<T, ObjectStoreError>;

/// One key reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Full object key (or common prefix for non-recursive listings).
    pub key: String,
    /// Object size in bytes; 0 for directory entries.
    pub size: u64,
    /// Key ends with `/`: a zero-byte marker or a common prefix.
    pub is_dir: bool,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        let key = key.into();
        let is_dir = key.ends_with('/');
        Self { key, size, is_dir }
    }
}

/// Why a primitive failed.
#[derive(Debug, Error)]
pub enum ObjectStoreCause {
    /// The key does not exist.
    #[error("no such key")]
    NoSuchKey,

    /// Transport or backend failure.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

/// Uniform failure of any object store primitive, tagged with the key involved.
#[derive(Debug, Error)]
pub struct ObjectStoreError {
    op: &'static str,
    key: String,
    #[source]
    cause: ObjectStoreCause,
}

impl ObjectStoreError {
    pub fn no_such_key(op: &'static str, key: impl Into<String>) -> Self {
        Self {
            op,
            key: key.into(),
            cause: ObjectStoreCause::NoSuchKey,
        }
    }

    pub fn backend<E>(op: &'static str, key: impl Into<String>, err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            op,
            key: key.into(),
            cause: ObjectStoreCause::Backend(err.into()),
        }
    }

    /// Name of the failed primitive.
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Key the primitive was called with.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.cause, ObjectStoreCause::NoSuchKey)
    }
}

impl fmt::Display for ObjectStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "object store {} failed for key `{}`: {}",
            self.op, self.key, self.cause
        )
    }
}

/// Outcome of one key in a batch delete.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub key: String,
    pub result: StorageResult<()>,
}

/// Primitive operations on a flat key space.
///
/// Implementations translate their backend failures into [`ObjectStoreError`] and never
/// let backend-specific error types escape.
#[async_trait]
pub trait ObjectStoreGateway: Send + Sync {
    /// Open a read stream over an object's bytes.
    async fn get(&self, key: &str) -> StorageResult<ByteStream>;

    /// Size of an object in bytes.
    async fn stat(&self, key: &str) -> StorageResult<u64>;

    /// Lazily list keys under `prefix`.
    ///
    /// Non-recursive listings stop at the next `/` and report the common prefix once as a
    /// directory entry. Entries come back in key order.
    fn list<'a>(&'a self, prefix: &'a str, recursive: bool)
        -> BoxStream<'a, StorageResult<ObjectEntry>>;

    /// Store everything read from `body` under `key`.
    ///
    /// `size` is the declared length when the caller knows it up front; streamed uploads
    /// pass `None` and are read until end of stream.
    async fn put(
        &self,
        key: &str,
        body: &mut (dyn AsyncRead + Unpin + Send),
        size: Option<u64>,
    ) -> StorageResult<()>;

    /// Server-side copy of `source` to `dest`.
    async fn copy(&self, source: &str, dest: &str) -> StorageResult<()>;

    /// Remove one key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Remove every key independently. Not transactional: a failure on one key does not
    /// stop or undo the others.
    async fn batch_delete(&self, keys: &[String]) -> Vec<DeleteOutcome> {
        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            let result = self.delete(key).await;
            outcomes.push(DeleteOutcome {
                key: key.clone(),
                result,
            });
        }
        outcomes
    }

    /// Whether anything exists at `key`.
    ///
    /// A key ending in `/` exists when a non-recursive listing under it yields at least
    /// one entry; any other key exists when it can be stat'ed.
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        if key.ends_with('/') {
            let mut listing = self.list(key, false);
            match listing.next().await {
                Some(Ok(_)) => Ok(true),
                Some(Err(e)) if e.is_not_found() => Ok(false),
                Some(Err(e)) => Err(e),
                None => Ok(false),
            }
        } else {
            match self.stat(key).await {
                Ok(_) => Ok(true),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e),
            }
        }
    }
}
