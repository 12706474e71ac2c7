//! Fault injection for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::io::AsyncRead;

use super::gateway::{ByteStream, ObjectEntry, ObjectStoreError, ObjectStoreGateway, StorageResult};
use super::memory::InMemoryGateway;

#[derive(Debug, Clone, Copy)]
enum Fault {
    Backend,
    Missing,
}

/// Wraps an [`InMemoryGateway`] and fails chosen `(op, key)` pairs.
#[derive(Default)]
pub struct FaultyGateway {
    pub inner: InMemoryGateway,
    faults: Mutex<HashMap<(&'static str, String), Fault>>,
}

impl FaultyGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `op` on `key` with a backend error.
    pub fn fail(&self, op: &'static str, key: &str) {
        self.inject(op, key, Fault::Backend);
    }

    /// Answer `op` on `key` as if the object had been removed concurrently.
    pub fn lose(&self, op: &'static str, key: &str) {
        self.inject(op, key, Fault::Missing);
    }

    fn inject(&self, op: &'static str, key: &str, fault: Fault) {
        self.faults.lock().unwrap().insert((op, key.to_string()), fault);
    }

    fn check(&self, op: &'static str, key: &str) -> StorageResult<()> {
        match self.faults.lock().unwrap().get(&(op, key.to_string())) {
            Some(Fault::Backend) => Err(ObjectStoreError::backend(op, key, "injected failure")),
            Some(Fault::Missing) => Err(ObjectStoreError::no_such_key(op, key)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStoreGateway for FaultyGateway {
    async fn get(&self, key: &str) -> StorageResult<ByteStream> {
        self.check("get", key)?;
        self.inner.get(key).await
    }

    async fn stat(&self, key: &str) -> StorageResult<u64> {
        self.check("stat", key)?;
        self.inner.stat(key).await
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, StorageResult<ObjectEntry>> {
        self.inner.list(prefix, recursive)
    }

    async fn put(
        &self,
        key: &str,
        body: &mut (dyn AsyncRead + Unpin + Send),
        size: Option<u64>,
    ) -> StorageResult<()> {
        self.check("put", key)?;
        self.inner.put(key, body, size).await
    }

    async fn copy(&self, source: &str, dest: &str) -> StorageResult<()> {
        self.check("copy", source)?;
        self.inner.copy(source, dest).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.check("delete", key)?;
        self.inner.delete(key).await
    }
}
