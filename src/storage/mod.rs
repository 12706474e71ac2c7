//! Object store access.
//!
//! Everything above this module talks to the bucket through [`ObjectStoreGateway`] only.

mod gateway;
mod memory;
mod s3;

pub use gateway::{
    ByteStream, DeleteOutcome, ObjectEntry, ObjectStoreCause, ObjectStoreError,
    ObjectStoreGateway, StorageResult,
};
pub use memory::InMemoryGateway;
pub use self::s3::S3Gateway;

#[cfg(test)]
pub(crate) mod testing;
