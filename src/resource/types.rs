//! Values returned by and handed to the resource service.

use std::fmt;

use bytes::Bytes;
use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::path::{ResourceKind, ResourcePath};
use crate::Result;

/// Type of a resource as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    File,
    Directory,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::File => "FILE",
            ResourceType::Directory => "DIRECTORY",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ResourceKind> for ResourceType {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::File => ResourceType::File,
            ResourceKind::Directory => ResourceType::Directory,
        }
    }
}

/// A file or directory, derived per request from the current object store state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Containing directory, always ending in `/`.
    pub path: String,
    /// Final path segment.
    pub name: String,
    pub resource_type: ResourceType,
    /// Size in bytes; `None` for directories.
    pub size: Option<u64>,
}

impl Resource {
    pub fn directory(path: &ResourcePath) -> Self {
        Self {
            path: path.parent_path(),
            name: path.name().to_string(),
            resource_type: ResourceType::Directory,
            size: None,
        }
    }

    pub fn file(path: &ResourcePath, size: u64) -> Self {
        Self {
            path: path.parent_path(),
            name: path.name().to_string(),
            resource_type: ResourceType::File,
            size: Some(size),
        }
    }

    /// Build from a listing entry: directories carry no size.
    pub fn from_entry(path: &ResourcePath, size: u64) -> Self {
        if path.is_directory() {
            Self::directory(path)
        } else {
            Self::file(path, size)
        }
    }

    pub fn is_directory(&self) -> bool {
        self.resource_type == ResourceType::Directory
    }
}

/// Content of an uploaded file, consumed chunk by chunk.
pub type UploadBody<'a> = BoxStream<'a, Result<Bytes>>;

/// One file of an upload request.
pub struct UploadFile<'a> {
    /// Original filename; may contain `/` for folder uploads.
    pub filename: String,
    pub body: UploadBody<'a>,
}

impl<'a> UploadFile<'a> {
    /// A file whose content is already in memory.
    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            body: stream::once(future::ready(Ok(content.into()))).boxed(),
        }
    }

    /// A file streamed from the request, e.g. one multipart field.
    pub fn from_stream<S>(filename: impl Into<String>, body: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'a,
    {
        Self {
            filename: filename.into(),
            body: body.boxed(),
        }
    }
}

impl fmt::Debug for UploadFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}
