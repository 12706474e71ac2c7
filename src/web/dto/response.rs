//! Response DTOs for the HTTP API.

use serde::Serialize;
use utoipa::ToSchema;

use crate::resource::Resource;

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// A file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResourceResponse {
    /// Containing directory, ending in `/`.
    pub path: String,
    /// Final path segment.
    pub name: String,
    /// Size in bytes (files only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// `FILE` or `DIRECTORY`.
    #[serde(rename = "type")]
    pub resource_type: String,
}

impl From<Resource> for ResourceResponse {
    fn from(resource: Resource) -> Self {
        Self {
            path: resource.path,
            name: resource.name,
            size: resource.size,
            resource_type: resource.resource_type.as_str().to_string(),
        }
    }
}

/// Convert a list of resources.
pub fn resource_list(resources: Vec<Resource>) -> Vec<ResourceResponse> {
    resources.into_iter().map(ResourceResponse::from).collect()
}

/// Current user.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub username: String,
}
