//! In-process object store.
//!
//! Backs the `memory` storage backend and the test suites. Keys are kept sorted so
//! listings come back in the same order an S3 bucket would return them.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::gateway::{ByteStream, ObjectEntry, ObjectStoreError, ObjectStoreGateway, StorageResult};

/// Size of the chunks `get` streams an object in.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Object store kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object directly, bypassing the gateway interface.
    pub fn insert(&self, key: impl Into<String>, content: impl Into<Bytes>) {
        self.write().insert(key.into(), content.into());
    }

    /// All keys currently stored, in order.
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Content of one object, if present.
    pub fn content(&self, key: &str) -> Option<Bytes> {
        self.read().get(key).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Bytes>> {
        self.objects.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Bytes>> {
        self.objects.write().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(&self, prefix: &str, recursive: bool) -> Vec<ObjectEntry> {
        let objects = self.read();
        let mut entries: Vec<ObjectEntry> = Vec::new();

        for (key, content) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };

            match rest.find('/') {
                Some(idx) if !recursive => {
                    let common = format!("{prefix}{}", &rest[..=idx]);
                    if entries.last().map(|e| e.key.as_str()) != Some(common.as_str()) {
                        entries.push(ObjectEntry::new(common, 0));
                    }
                }
                _ => entries.push(ObjectEntry::new(key.clone(), content.len() as u64)),
            }
        }

        entries
    }
}

#[async_trait]
impl ObjectStoreGateway for InMemoryGateway {
    async fn get(&self, key: &str) -> StorageResult<ByteStream> {
        let content = self
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::no_such_key("get", key))?;

        let chunks: Vec<StorageResult<Bytes>> = (0..content.len())
            .step_by(READ_CHUNK_SIZE)
            .map(|start| {
                let end = (start + READ_CHUNK_SIZE).min(content.len());
                Ok(content.slice(start..end))
            })
            .collect();

        Ok(stream::iter(chunks).boxed())
    }

    async fn stat(&self, key: &str) -> StorageResult<u64> {
        self.read()
            .get(key)
            .map(|content| content.len() as u64)
            .ok_or_else(|| ObjectStoreError::no_such_key("stat", key))
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, StorageResult<ObjectEntry>> {
        stream::iter(self.snapshot(prefix, recursive).into_iter().map(Ok)).boxed()
    }

    async fn put(
        &self,
        key: &str,
        body: &mut (dyn AsyncRead + Unpin + Send),
        size: Option<u64>,
    ) -> StorageResult<()> {
        let mut buf = Vec::with_capacity(size.unwrap_or(0) as usize);
        body.read_to_end(&mut buf)
            .await
            .map_err(|e| ObjectStoreError::backend("put", key, e))?;

        if let Some(size) = size.filter(|&size| size != buf.len() as u64) {
            return Err(ObjectStoreError::backend(
                "put",
                key,
                format!("declared {size} bytes, received {}", buf.len()),
            ));
        }

        self.write().insert(key.to_string(), Bytes::from(buf));
        Ok(())
    }

    async fn copy(&self, source: &str, dest: &str) -> StorageResult<()> {
        let mut objects = self.write();
        let content = objects
            .get(source)
            .cloned()
            .ok_or_else(|| ObjectStoreError::no_such_key("copy", source))?;
        objects.insert(dest.to_string(), content);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn seeded() -> InMemoryGateway {
        let gw = InMemoryGateway::new();
        gw.insert("t/", Bytes::new());
        gw.insert("t/a/", Bytes::new());
        gw.insert("t/a/x.txt", "xx");
        gw.insert("t/a/b/y.txt", "yyy");
        gw.insert("t/a-c.txt", "c");
        gw.insert("t/z.txt", "z");
        gw.insert("u/other.txt", "o");
        gw
    }

    async fn keys(gw: &InMemoryGateway, prefix: &str, recursive: bool) -> Vec<String> {
        gw.list(prefix, recursive)
            .map_ok(|e| e.key)
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_recursive_listing() {
        let gw = seeded();
        assert_eq!(
            keys(&gw, "t/a/", true).await,
            vec!["t/a/", "t/a/b/y.txt", "t/a/x.txt"]
        );
    }

    #[tokio::test]
    async fn test_non_recursive_listing_collapses_common_prefixes() {
        let gw = seeded();
        assert_eq!(
            keys(&gw, "t/", false).await,
            vec!["t/", "t/a-c.txt", "t/a/", "t/z.txt"]
        );
        assert_eq!(
            keys(&gw, "t/a/", false).await,
            vec!["t/a/", "t/a/b/", "t/a/x.txt"]
        );
    }

    #[tokio::test]
    async fn test_listing_reports_dir_flags_and_sizes() {
        let gw = seeded();
        let entries: Vec<ObjectEntry> = gw.list("t/a/", false).try_collect().await.unwrap();
        assert!(entries[1].is_dir);
        assert_eq!(entries[2].size, 2);
        assert!(!entries[2].is_dir);
    }

    #[tokio::test]
    async fn test_exists() {
        let gw = seeded();
        assert!(gw.exists("t/a/").await.unwrap());
        assert!(gw.exists("t/a/b/").await.unwrap());
        assert!(gw.exists("t/a/x.txt").await.unwrap());
        assert!(!gw.exists("t/missing/").await.unwrap());
        assert!(!gw.exists("t/a/missing.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_get_stat() {
        let gw = InMemoryGateway::new();
        let payload = vec![7u8; READ_CHUNK_SIZE + 10];
        gw.put("k", &mut payload.as_slice(), Some(payload.len() as u64))
            .await
            .unwrap();

        assert_eq!(gw.stat("k").await.unwrap(), payload.len() as u64);

        let chunks: Vec<Bytes> = gw.get("k").await.unwrap().try_collect().await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.concat(), payload);
    }

    #[tokio::test]
    async fn test_put_rejects_size_mismatch() {
        let gw = InMemoryGateway::new();
        let result = gw.put("k", &mut &b"abc"[..], Some(5)).await;
        assert!(result.is_err());
        assert!(gw.keys().is_empty());
    }

    #[tokio::test]
    async fn test_put_without_declared_size() {
        let gw = InMemoryGateway::new();
        gw.put("k", &mut &b"streamed"[..], None).await.unwrap();
        assert_eq!(gw.content("k"), Some(Bytes::from("streamed")));
    }

    #[tokio::test]
    async fn test_missing_keys_are_not_found() {
        let gw = InMemoryGateway::new();
        assert!(gw.stat("nope").await.unwrap_err().is_not_found());
        assert!(gw.get("nope").await.err().unwrap().is_not_found());
        assert!(gw.copy("nope", "dest").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_copy_and_batch_delete() {
        let gw = seeded();
        gw.copy("t/z.txt", "t/z2.txt").await.unwrap();
        assert_eq!(gw.content("t/z2.txt").unwrap(), Bytes::from("z"));

        let outcomes = gw
            .batch_delete(&["t/z.txt".to_string(), "t/z2.txt".to_string()])
            .await;
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        assert!(!gw.keys().contains(&"t/z.txt".to_string()));
        assert!(!gw.keys().contains(&"t/z2.txt".to_string()));
    }
}
