//! Hierarchical resources emulated on top of the object store.

mod archive;
mod hierarchy;
mod service;
mod types;

pub use archive::ZipStreamer;
pub use hierarchy::HierarchyReconstructor;
pub use service::{Download, ResourceService, Upload};
pub use types::{Resource, ResourceType, UploadBody, UploadFile};
