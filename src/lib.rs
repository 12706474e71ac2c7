//! cloudshelf - per-tenant file storage on an S3-compatible object store
//!
//! Files and folders are kept as flat object keys under a tenant prefix; directories,
//! recursive delete/move, zipped folder downloads and search are emulated on top of key
//! listings.

pub mod config;
pub mod error;
pub mod logging;
pub mod path;
pub mod resource;
pub mod storage;
pub mod web;

use std::sync::Arc;

pub use config::Config;
pub use error::{CloudshelfError, Result};
pub use path::{ResourcePath, TenantId, UserNamespace};
pub use resource::{Resource, ResourceService, ResourceType, UploadFile};
pub use storage::{InMemoryGateway, ObjectStoreError, ObjectStoreGateway, S3Gateway};

/// Build the configured object store backend, creating the bucket when needed.
pub async fn connect_storage(config: &config::StorageConfig) -> Result<Arc<dyn ObjectStoreGateway>> {
    match config.backend.as_str() {
        "memory" => {
            tracing::warn!("Using in-memory storage; nothing will be persisted");
            Ok(Arc::new(InMemoryGateway::new()))
        }
        "s3" => {
            let gateway = S3Gateway::new(config)?;
            gateway.ensure_bucket().await?;
            tracing::info!(
                endpoint = %config.endpoint,
                bucket = %config.bucket,
                "Connected to object store"
            );
            Ok(Arc::new(gateway))
        }
        other => Err(CloudshelfError::Config(format!(
            "unknown storage backend: {other}"
        ))),
    }
}

/// Wire the resource service from configuration.
pub async fn build_service(config: &Config) -> Result<ResourceService> {
    let gateway = connect_storage(&config.storage).await?;
    let namespace = UserNamespace::new(&config.storage.user_prefix, &config.storage.user_suffix);
    Ok(ResourceService::new(gateway, namespace))
}
