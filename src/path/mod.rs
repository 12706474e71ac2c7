//! Logical paths: normalization, structural validation and tenant key mapping.

mod namespace;
mod normalizer;
mod validator;

pub use namespace::{TenantId, UserNamespace};
pub use normalizer::{normalize, ROOT};
pub use validator::{validate_path, validate_query, ResourceKind, ResourcePath};
