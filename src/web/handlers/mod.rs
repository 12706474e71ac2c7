//! API handlers.

pub mod directory;
pub mod resource;
pub mod user;

pub use directory::*;
pub use resource::*;
pub use user::*;

use crate::resource::ResourceService;

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub resources: ResourceService,
    /// Maximum upload request size in bytes.
    pub max_upload_size: usize,
}

impl AppState {
    pub fn new(resources: ResourceService, max_upload_size: usize) -> Self {
        Self {
            resources,
            max_upload_size,
        }
    }
}
