//! Directory and file operations over the flat key space.

use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tokio_util::io::StreamReader;

use super::archive::ZipStreamer;
use super::hierarchy::HierarchyReconstructor;
use super::types::{Resource, UploadFile};
use crate::path::{validate_query, ResourcePath, TenantId, UserNamespace};
use crate::storage::{ObjectStoreError, ObjectStoreGateway};
use crate::{CloudshelfError, Result};

/// Body of a download together with the name to offer it under.
pub struct Download {
    /// Suggested filename; directories get a `.zip` suffix.
    pub filename: String,
    /// Exact length when known up front (plain files only).
    pub size: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("filename", &self.filename)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Name offered for an archive of the tenant root.
const ROOT_ARCHIVE_NAME: &str = "files";

/// Orchestrates every resource operation for every tenant.
///
/// All paths handed in are already normalized and structurally valid; this service adds
/// the tenant prefix, checks existence and drives the gateway.
#[derive(Clone)]
pub struct ResourceService {
    gateway: Arc<dyn ObjectStoreGateway>,
    namespace: UserNamespace,
    archive: ZipStreamer,
}

impl ResourceService {
    pub fn new(gateway: Arc<dyn ObjectStoreGateway>, namespace: UserNamespace) -> Self {
        let archive = ZipStreamer::new(Arc::clone(&gateway));
        Self {
            gateway,
            namespace,
            archive,
        }
    }

    pub fn namespace(&self) -> &UserNamespace {
        &self.namespace
    }

    /// Fail with `ResourceNotFound` unless something exists at `path`.
    ///
    /// The root always exists.
    pub async fn prefix_validation(&self, tenant: TenantId, path: &ResourcePath) -> Result<()> {
        if path.is_root() {
            return Ok(());
        }
        let key = self.namespace.key(tenant, path);
        if self.gateway.exists(&key).await? {
            Ok(())
        } else {
            Err(CloudshelfError::ResourceNotFound(path.to_string()))
        }
    }

    /// Describe the resource at `path`.
    ///
    /// Directories are built from the path alone; only files hit the store.
    pub async fn resolve(&self, tenant: TenantId, path: &ResourcePath) -> Result<Resource> {
        if path.is_directory() {
            return Ok(Resource::directory(path));
        }
        let size = self.stat_file(tenant, path).await?;
        Ok(Resource::file(path, size))
    }

    /// [`Self::resolve`] for an existing resource; missing directories are `ResourceNotFound`.
    pub async fn info(&self, tenant: TenantId, path: &ResourcePath) -> Result<Resource> {
        if path.is_directory() {
            self.prefix_validation(tenant, path).await?;
        }
        self.resolve(tenant, path).await
    }

    /// Immediate children of a directory.
    pub async fn list(&self, tenant: TenantId, path: &ResourcePath) -> Result<Vec<Resource>> {
        require_directory(path)?;
        self.prefix_validation(tenant, path).await?;

        let key = self.namespace.key(tenant, path);
        let entries: Vec<_> = self.gateway.list(&key, false).try_collect().await?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.key != key)
            .filter_map(|entry| {
                let relative = self.namespace.strip(tenant, &entry.key)?;
                Some(Resource::from_entry(
                    &ResourcePath::from_relative(relative),
                    entry.size,
                ))
            })
            .collect())
    }

    /// Write the marker for a new directory. The parent must exist.
    pub async fn create_directory(&self, tenant: TenantId, path: &ResourcePath) -> Result<Resource> {
        require_directory(path)?;
        if path.is_root() {
            return Err(CloudshelfError::PathNotValid(
                "the root directory cannot be created".to_string(),
            ));
        }
        if let Some(parent) = path.parent() {
            self.prefix_validation(tenant, &parent).await?;
        }

        let key = self.namespace.key(tenant, path);
        if self.occupied(&key).await? {
            return Err(CloudshelfError::ResourceAlreadyExist(path.to_string()));
        }

        self.put_marker(&key).await?;
        tracing::info!(tenant = %tenant, path = %path, "Created directory");
        Ok(Resource::directory(path))
    }

    /// Delete a file, or a directory with everything under it.
    ///
    /// Directory deletion is not transactional: every key is attempted, and the first
    /// failure is reported after the others may already be gone.
    pub async fn delete(&self, tenant: TenantId, path: &ResourcePath) -> Result<()> {
        require_not_root(path, "deleted")?;
        self.prefix_validation(tenant, path).await?;

        let key = self.namespace.key(tenant, path);
        if !path.is_directory() {
            self.gateway.delete(&key).await?;
            tracing::info!(tenant = %tenant, path = %path, "Deleted file");
            return Ok(());
        }

        let mut keys = self.collect_keys(&key).await?;
        if keys.is_empty() {
            keys.push(key);
        }

        let total = keys.len();
        let failed = first_failure(self.gateway.batch_delete(&keys).await);
        tracing::info!(tenant = %tenant, path = %path, keys = total, "Deleted directory");
        match failed {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Move or rename `from` to `to`.
    ///
    /// Every copy completes before any source key is deleted, so a failure part way leaves
    /// the data duplicated rather than lost.
    pub async fn move_resource(
        &self,
        tenant: TenantId,
        from: &ResourcePath,
        to: &ResourcePath,
    ) -> Result<Resource> {
        require_not_root(from, "moved")?;
        require_not_root(to, "replaced")?;
        if from.kind() != to.kind() {
            return Err(CloudshelfError::PathNotValid(format!(
                "{from} and {to} must both be files or both be directories"
            )));
        }
        if from.contains(to) {
            return Err(CloudshelfError::PathNotValid(format!(
                "{from} cannot be moved into itself"
            )));
        }

        self.prefix_validation(tenant, from).await?;

        let from_key = self.namespace.key(tenant, from);
        let to_key = self.namespace.key(tenant, to);
        if self.occupied(&to_key).await? {
            return Err(CloudshelfError::ResourceAlreadyExist(to.to_string()));
        }

        if !from.is_directory() {
            self.gateway.copy(&from_key, &to_key).await?;
            self.gateway.delete(&from_key).await?;
            tracing::info!(tenant = %tenant, from = %from, to = %to, "Moved file");
            let size = self.gateway.stat(&to_key).await?;
            return Ok(Resource::file(to, size));
        }

        let sources = self.collect_keys(&from_key).await?;
        for source in &sources {
            let Some(suffix) = source.strip_prefix(from_key.as_str()) else {
                continue;
            };
            self.gateway.copy(source, &format!("{to_key}{suffix}")).await?;
        }

        let failed = first_failure(self.gateway.batch_delete(&sources).await);
        tracing::info!(
            tenant = %tenant,
            from = %from,
            to = %to,
            keys = sources.len(),
            "Moved directory"
        );
        match failed {
            Some(e) => Err(e.into()),
            None => Ok(Resource::directory(to)),
        }
    }

    /// Start storing uploaded files under the directory `path`.
    pub fn begin_upload(&self, tenant: TenantId, path: &ResourcePath) -> Result<Upload<'_>> {
        require_directory(path)?;
        Ok(Upload {
            service: self,
            tenant,
            path: path.clone(),
            markers_checked: HashSet::new(),
            created: Vec::new(),
        })
    }

    /// Store every file of `files` under the directory `path`, stopping at the first
    /// failure. Files stored before the failure are kept.
    pub async fn upload(
        &self,
        tenant: TenantId,
        path: &ResourcePath,
        files: Vec<UploadFile<'_>>,
    ) -> Result<Vec<Resource>> {
        let mut upload = self.begin_upload(tenant, path)?;
        for file in files {
            upload.write(file).await?;
        }
        Ok(upload.finish())
    }

    /// Open the content of a file, or a zip archive of a directory.
    pub async fn download(&self, tenant: TenantId, path: &ResourcePath) -> Result<Download> {
        let key = self.namespace.key(tenant, path);

        if path.is_directory() {
            self.prefix_validation(tenant, path).await?;
            let name = if path.is_root() {
                ROOT_ARCHIVE_NAME
            } else {
                path.name()
            };
            tracing::info!(tenant = %tenant, path = %path, "Streaming directory archive");
            return Ok(Download {
                filename: format!("{name}.zip"),
                size: None,
                body: self.archive.stream(key),
            });
        }

        let size = self.stat_file(tenant, path).await?;
        let body = self
            .gateway
            .get(&key)
            .await
            .map_err(|e| not_found_or(e, path))?;

        Ok(Download {
            filename: path.name().to_string(),
            size: Some(size),
            body: body.map_err(CloudshelfError::from).boxed(),
        })
    }

    /// Files and directories of `tenant` whose name contains `query`, ignoring case.
    pub async fn search(&self, tenant: TenantId, query: &str) -> Result<Vec<Resource>> {
        validate_query(query)?;

        let prefix = self.namespace.prefix(tenant);
        let mut hierarchy = HierarchyReconstructor::new(prefix.as_str());
        let mut listing = self.gateway.list(&prefix, true);
        while let Some(entry) = listing.try_next().await? {
            hierarchy.add(&entry.key);
        }
        drop(listing);

        let needle = query.to_lowercase();
        let mut results = Vec::new();
        for candidate in hierarchy.into_candidates() {
            if !candidate.name().to_lowercase().contains(&needle) {
                continue;
            }
            results.push(self.resolve(tenant, &candidate).await?);
        }

        tracing::debug!(tenant = %tenant, query, matches = results.len(), "Search finished");
        Ok(results)
    }

    /// Write the tenant root marker if it is missing. Returns whether it was created.
    pub async fn provision_tenant(&self, tenant: TenantId) -> Result<bool> {
        let created = self.ensure_marker(&self.namespace.prefix(tenant)).await?;
        if created {
            tracing::info!(tenant = %tenant, "Provisioned tenant root");
        }
        Ok(created)
    }

    /// Whether `key` or its counterpart of the other kind (`c` for `c/` and back) exists.
    async fn occupied(&self, key: &str) -> Result<bool> {
        let counterpart = match key.strip_suffix('/') {
            Some(file) => file.to_string(),
            None => format!("{key}/"),
        };
        Ok(self.gateway.exists(key).await? || self.gateway.exists(&counterpart).await?)
    }

    async fn stat_file(&self, tenant: TenantId, path: &ResourcePath) -> Result<u64> {
        let key = self.namespace.key(tenant, path);
        self.gateway
            .stat(&key)
            .await
            .map_err(|e| not_found_or(e, path))
    }

    /// Every key under `prefix`, including its own marker.
    async fn collect_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .gateway
            .list(prefix, true)
            .map_ok(|entry| entry.key)
            .try_collect()
            .await?)
    }

    async fn put_marker(&self, key: &str) -> Result<()> {
        self.gateway.put(key, &mut tokio::io::empty(), Some(0)).await?;
        Ok(())
    }

    /// Create the zero-byte marker at `key` unless that exact object exists.
    async fn ensure_marker(&self, key: &str) -> Result<bool> {
        match self.gateway.stat(key).await {
            Ok(_) => Ok(false),
            Err(e) if e.is_not_found() => {
                self.put_marker(key).await?;
                Ok(true)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// An upload request in progress.
///
/// Each file is checked right before its own write and streamed to the store without
/// being buffered whole, so a failing file leaves the ones written before it in place.
pub struct Upload<'s> {
    service: &'s ResourceService,
    tenant: TenantId,
    path: ResourcePath,
    markers_checked: HashSet<String>,
    created: Vec<Resource>,
}

#[derive(Default)]
struct UploadTally {
    bytes: u64,
    failure: Option<CloudshelfError>,
}

impl Upload<'_> {
    /// Check and store one file, then create the markers between it and the upload path.
    pub async fn write(&mut self, file: UploadFile<'_>) -> Result<Resource> {
        let service = self.service;
        let target = self.path.join(&file.filename)?;
        if target.is_directory() {
            return Err(CloudshelfError::PathNotValid(format!(
                "{target}: uploaded file name must not end with '/'"
            )));
        }

        let key = service.namespace.key(self.tenant, &target);
        if service.occupied(&key).await? {
            return Err(CloudshelfError::ResourceAlreadyExist(target.to_string()));
        }

        let mut body = file.body;
        let first = loop {
            match body.try_next().await? {
                Some(chunk) if chunk.is_empty() => continue,
                Some(chunk) => break chunk,
                None => return Err(CloudshelfError::EmptyResource(target.to_string())),
            }
        };

        // The reader only carries io::Error; the original body error is kept aside.
        let tally = Arc::new(Mutex::new(UploadTally::default()));
        let counted = stream::once(future::ready(Ok(first))).chain(body).map({
            let tally = Arc::clone(&tally);
            move |item| {
                let mut tally = tally.lock().unwrap_or_else(PoisonError::into_inner);
                match item {
                    Ok(chunk) => {
                        tally.bytes += chunk.len() as u64;
                        Ok(chunk)
                    }
                    Err(e) => {
                        let err = io::Error::other(e.to_string());
                        tally.failure.get_or_insert(e);
                        Err(err)
                    }
                }
            }
        });
        let mut reader = StreamReader::new(counted);
        let stored = service.gateway.put(&key, &mut reader, None).await;

        let (size, failure) = {
            let mut tally = tally.lock().unwrap_or_else(PoisonError::into_inner);
            (tally.bytes, tally.failure.take())
        };
        if let Some(e) = failure {
            return Err(e);
        }
        stored?;

        let mut dir = target.parent();
        while let Some(current) = dir {
            if current.is_root() || !self.markers_checked.insert(current.relative().to_string()) {
                break;
            }
            service
                .ensure_marker(&service.namespace.key(self.tenant, &current))
                .await?;
            if current == self.path {
                break;
            }
            dir = current.parent();
        }

        tracing::debug!(tenant = %self.tenant, path = %target, size, "Stored uploaded file");
        let resource = Resource::file(&target, size);
        self.created.push(resource.clone());
        Ok(resource)
    }

    /// Everything stored by this upload, in write order.
    pub fn finish(self) -> Vec<Resource> {
        tracing::info!(
            tenant = %self.tenant,
            path = %self.path,
            files = self.created.len(),
            "Uploaded files"
        );
        self.created
    }
}

fn require_directory(path: &ResourcePath) -> Result<()> {
    if path.is_directory() {
        Ok(())
    } else {
        Err(CloudshelfError::PathNotValid(format!(
            "{path}: expected a directory"
        )))
    }
}

fn require_not_root(path: &ResourcePath, action: &str) -> Result<()> {
    if path.is_root() {
        Err(CloudshelfError::PathNotValid(format!(
            "the root directory cannot be {action}"
        )))
    } else {
        Ok(())
    }
}

fn not_found_or(err: ObjectStoreError, path: &ResourcePath) -> CloudshelfError {
    if err.is_not_found() {
        CloudshelfError::ResourceNotFound(path.to_string())
    } else {
        err.into()
    }
}

fn first_failure(outcomes: Vec<crate::storage::DeleteOutcome>) -> Option<ObjectStoreError> {
    let mut failures = outcomes.into_iter().filter_map(|o| o.result.err());
    let first = failures.next();
    let rest = failures.count();
    if let Some(e) = &first {
        tracing::error!(key = e.key(), others = rest, error = %e, "Batch delete incomplete");
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::FaultyGateway;
    use crate::storage::InMemoryGateway;
    use async_zip::base::read::mem::ZipFileReader;

    const TENANT: TenantId = TenantId(1);

    fn path(raw: &str) -> ResourcePath {
        ResourcePath::parse(raw).unwrap()
    }

    fn namespace() -> UserNamespace {
        UserNamespace::new("user-", "-files/")
    }

    fn service() -> (ResourceService, Arc<InMemoryGateway>) {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.insert("user-1-files/", Bytes::new());
        let service = ResourceService::new(gateway.clone(), namespace());
        (service, gateway)
    }

    fn faulty_service() -> (ResourceService, Arc<FaultyGateway>) {
        let gateway = Arc::new(FaultyGateway::new());
        gateway.inner.insert("user-1-files/", Bytes::new());
        let service = ResourceService::new(gateway.clone(), namespace());
        (service, gateway)
    }

    fn seed_a(gateway: &InMemoryGateway) {
        gateway.insert("user-1-files/a/", Bytes::new());
        gateway.insert("user-1-files/a/x.txt", "xx");
        gateway.insert("user-1-files/a/b/y.txt", "yyy");
    }

    fn keys_under(gateway: &InMemoryGateway, prefix: &str) -> Vec<String> {
        gateway
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect()
    }

    // ========================================================================
    // Resolve / list
    // ========================================================================

    #[tokio::test]
    async fn test_resolve_file_and_directory() {
        let (service, gateway) = service();
        seed_a(&gateway);

        let file = service.resolve(TENANT, &path("a/x.txt")).await.unwrap();
        assert_eq!(file, Resource::file(&path("a/x.txt"), 2));

        let dir = service.resolve(TENANT, &path("a/b/")).await.unwrap();
        assert_eq!(dir.name, "b");
        assert_eq!(dir.path, "a/");
        assert_eq!(dir.size, None);
    }

    #[tokio::test]
    async fn test_resolve_missing_is_not_found() {
        let (service, _) = service();
        assert!(matches!(
            service.resolve(TENANT, &path("nope.txt")).await,
            Err(CloudshelfError::ResourceNotFound(_))
        ));
        assert!(matches!(
            service.info(TENANT, &path("nope/")).await,
            Err(CloudshelfError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_directory_skips_store() {
        let (service, gateway) = service();
        let dir = service.resolve(TENANT, &path("nope/")).await.unwrap();
        assert_eq!(dir, Resource::directory(&path("nope/")));
        assert!(gateway.keys().is_empty());

        let root = service.info(TENANT, &ResourcePath::root()).await.unwrap();
        assert!(root.is_directory());
    }

    #[tokio::test]
    async fn test_resolve_backend_failure_is_not_not_found() {
        let (service, gateway) = faulty_service();
        gateway.inner.insert("user-1-files/a.txt", "a");
        gateway.fail("stat", "user-1-files/a.txt");
        assert!(matches!(
            service.resolve(TENANT, &path("a.txt")).await,
            Err(CloudshelfError::ObjectStore(_))
        ));
    }

    #[tokio::test]
    async fn test_list_excludes_own_marker() {
        let (service, gateway) = service();
        seed_a(&gateway);

        let listing = service.list(TENANT, &path("a/")).await.unwrap();
        assert_eq!(
            listing,
            vec![
                Resource::directory(&path("a/b/")),
                Resource::file(&path("a/x.txt"), 2),
            ]
        );

        let root = service.list(TENANT, &ResourcePath::root()).await.unwrap();
        assert_eq!(root, vec![Resource::directory(&path("a/"))]);
    }

    #[tokio::test]
    async fn test_list_rejects_file_path() {
        let (service, gateway) = service();
        seed_a(&gateway);
        assert!(matches!(
            service.list(TENANT, &path("a/x.txt")).await,
            Err(CloudshelfError::PathNotValid(_))
        ));
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let (service, gateway) = service();
        gateway.insert("user-2-files/secret.txt", "s");
        gateway.insert("user-12-files/other.txt", "o");

        assert!(service.list(TENANT, &ResourcePath::root()).await.unwrap().is_empty());
        assert!(service.resolve(TENANT, &path("secret.txt")).await.is_err());
    }

    // ========================================================================
    // Create / delete
    // ========================================================================

    #[tokio::test]
    async fn test_create_directory_twice_fails() {
        let (service, gateway) = service();

        let created = service.create_directory(TENANT, &path("/a/")).await.unwrap();
        assert_eq!(created.name, "a");
        assert_eq!(created.path, "/");
        assert_eq!(gateway.content("user-1-files/a/"), Some(Bytes::new()));

        assert!(matches!(
            service.create_directory(TENANT, &path("/a/")).await,
            Err(CloudshelfError::ResourceAlreadyExist(_))
        ));
    }

    #[tokio::test]
    async fn test_create_directory_over_file_fails() {
        let (service, gateway) = service();
        gateway.insert("user-1-files/c", "file");

        assert!(matches!(
            service.create_directory(TENANT, &path("c/")).await,
            Err(CloudshelfError::ResourceAlreadyExist(_))
        ));
        assert_eq!(gateway.keys(), vec!["user-1-files/", "user-1-files/c"]);
    }

    #[tokio::test]
    async fn test_create_directory_requires_parent() {
        let (service, _) = service();
        assert!(matches!(
            service.create_directory(TENANT, &path("missing/child/")).await,
            Err(CloudshelfError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_directory_rejects_root_and_files() {
        let (service, _) = service();
        assert!(matches!(
            service.create_directory(TENANT, &ResourcePath::root()).await,
            Err(CloudshelfError::PathNotValid(_))
        ));
        assert!(matches!(
            service.create_directory(TENANT, &path("a.txt")).await,
            Err(CloudshelfError::PathNotValid(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_directory_removes_every_key() {
        let (service, gateway) = service();
        seed_a(&gateway);

        service.delete(TENANT, &path("/a/")).await.unwrap();

        assert!(keys_under(&gateway, "user-1-files/a/").is_empty());
        assert!(matches!(
            service.list(TENANT, &path("/a/")).await,
            Err(CloudshelfError::ResourceNotFound(_))
        ));
        assert_eq!(gateway.keys(), vec!["user-1-files/"]);
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (service, gateway) = service();
        seed_a(&gateway);

        service.delete(TENANT, &path("a/x.txt")).await.unwrap();
        assert!(gateway.content("user-1-files/a/x.txt").is_none());
        assert!(gateway.content("user-1-files/a/b/y.txt").is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_and_root() {
        let (service, _) = service();
        assert!(matches!(
            service.delete(TENANT, &path("ghost/")).await,
            Err(CloudshelfError::ResourceNotFound(_))
        ));
        assert!(matches!(
            service.delete(TENANT, &ResourcePath::root()).await,
            Err(CloudshelfError::PathNotValid(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_not_transactional() {
        let (service, gateway) = faulty_service();
        gateway.inner.insert("user-1-files/a/", Bytes::new());
        gateway.inner.insert("user-1-files/a/1.txt", "1");
        gateway.inner.insert("user-1-files/a/2.txt", "2");
        gateway.fail("delete", "user-1-files/a/1.txt");

        let err = service.delete(TENANT, &path("a/")).await.unwrap_err();
        match err {
            CloudshelfError::ObjectStore(e) => assert_eq!(e.key(), "user-1-files/a/1.txt"),
            other => panic!("unexpected error: {other:?}"),
        }

        // The other keys were removed independently of the failure.
        assert_eq!(
            keys_under(&gateway.inner, "user-1-files/a/"),
            vec!["user-1-files/a/1.txt"]
        );
    }

    // ========================================================================
    // Move
    // ========================================================================

    #[tokio::test]
    async fn test_move_directory_preserves_relative_paths() {
        let (service, gateway) = service();
        seed_a(&gateway);

        let moved = service
            .move_resource(TENANT, &path("/a/"), &path("/b/"))
            .await
            .unwrap();
        assert_eq!(moved, Resource::directory(&path("b/")));

        assert!(keys_under(&gateway, "user-1-files/a/").is_empty());
        assert_eq!(
            keys_under(&gateway, "user-1-files/b/"),
            vec![
                "user-1-files/b/",
                "user-1-files/b/b/y.txt",
                "user-1-files/b/x.txt"
            ]
        );
        assert_eq!(
            gateway.content("user-1-files/b/b/y.txt"),
            Some(Bytes::from("yyy"))
        );
    }

    #[tokio::test]
    async fn test_move_file() {
        let (service, gateway) = service();
        seed_a(&gateway);

        let moved = service
            .move_resource(TENANT, &path("a/x.txt"), &path("renamed.txt"))
            .await
            .unwrap();
        assert_eq!(moved, Resource::file(&path("renamed.txt"), 2));
        assert!(gateway.content("user-1-files/a/x.txt").is_none());
        assert_eq!(gateway.content("user-1-files/renamed.txt"), Some(Bytes::from("xx")));
    }

    #[tokio::test]
    async fn test_move_onto_existing_fails() {
        let (service, gateway) = service();
        seed_a(&gateway);
        gateway.insert("user-1-files/c/", Bytes::new());

        assert!(matches!(
            service.move_resource(TENANT, &path("a/"), &path("c/")).await,
            Err(CloudshelfError::ResourceAlreadyExist(_))
        ));
        assert!(matches!(
            service.move_resource(TENANT, &path("a/x.txt"), &path("a/x.txt")).await,
            Err(CloudshelfError::ResourceAlreadyExist(_))
        ));
    }

    #[tokio::test]
    async fn test_move_file_onto_directory_name_fails() {
        let (service, gateway) = service();
        gateway.insert("user-1-files/c/", Bytes::new());
        gateway.insert("user-1-files/x.txt", "x");

        assert!(matches!(
            service.move_resource(TENANT, &path("x.txt"), &path("c")).await,
            Err(CloudshelfError::ResourceAlreadyExist(_))
        ));
        assert_eq!(
            gateway.keys(),
            vec!["user-1-files/", "user-1-files/c/", "user-1-files/x.txt"]
        );
    }

    #[tokio::test]
    async fn test_move_directory_onto_file_name_fails() {
        let (service, gateway) = service();
        seed_a(&gateway);
        gateway.insert("user-1-files/c", "file");

        assert!(matches!(
            service.move_resource(TENANT, &path("a/"), &path("c/")).await,
            Err(CloudshelfError::ResourceAlreadyExist(_))
        ));
        assert!(keys_under(&gateway, "user-1-files/c/").is_empty());
        assert_eq!(gateway.content("user-1-files/a/x.txt"), Some(Bytes::from("xx")));
    }

    #[tokio::test]
    async fn test_move_rejects_invalid_pairs() {
        let (service, gateway) = service();
        seed_a(&gateway);

        for (from, to) in [("a/", "a/b/c/"), ("a/", "z.txt"), ("a/x.txt", "z/")] {
            assert!(
                matches!(
                    service.move_resource(TENANT, &path(from), &path(to)).await,
                    Err(CloudshelfError::PathNotValid(_))
                ),
                "{from} -> {to}"
            );
        }
        assert!(matches!(
            service
                .move_resource(TENANT, &ResourcePath::root(), &path("z/"))
                .await,
            Err(CloudshelfError::PathNotValid(_))
        ));
        assert!(matches!(
            service.move_resource(TENANT, &path("nope/"), &path("z/")).await,
            Err(CloudshelfError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_move_copies_everything_before_deleting() {
        let (service, gateway) = faulty_service();
        gateway.inner.insert("user-1-files/a/", Bytes::new());
        gateway.inner.insert("user-1-files/a/1.txt", "1");
        gateway.inner.insert("user-1-files/a/2.txt", "2");
        gateway.fail("copy", "user-1-files/a/2.txt");

        assert!(service
            .move_resource(TENANT, &path("a/"), &path("b/"))
            .await
            .is_err());

        // Nothing was deleted: the source is intact, the partial copy is duplicated data.
        assert_eq!(
            keys_under(&gateway.inner, "user-1-files/a/"),
            vec![
                "user-1-files/a/",
                "user-1-files/a/1.txt",
                "user-1-files/a/2.txt"
            ]
        );
        assert_eq!(
            keys_under(&gateway.inner, "user-1-files/b/"),
            vec!["user-1-files/b/", "user-1-files/b/1.txt"]
        );
    }

    // ========================================================================
    // Upload
    // ========================================================================

    #[tokio::test]
    async fn test_upload_creates_files_and_markers() {
        let (service, gateway) = service();

        let created = service
            .upload(
                TENANT,
                &path("docs/"),
                vec![
                    UploadFile::new("a.txt", "aaa"),
                    UploadFile::new("sub/deep/b.txt", "b"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            created,
            vec![
                Resource::file(&path("docs/a.txt"), 3),
                Resource::file(&path("docs/sub/deep/b.txt"), 1),
            ]
        );
        assert_eq!(
            gateway.keys(),
            vec![
                "user-1-files/",
                "user-1-files/docs/",
                "user-1-files/docs/a.txt",
                "user-1-files/docs/sub/",
                "user-1-files/docs/sub/deep/",
                "user-1-files/docs/sub/deep/b.txt",
            ]
        );
    }

    #[tokio::test]
    async fn test_upload_into_root() {
        let (service, gateway) = service();
        service
            .upload(TENANT, &ResourcePath::root(), vec![UploadFile::new("top.txt", "t")])
            .await
            .unwrap();
        assert_eq!(gateway.content("user-1-files/top.txt"), Some(Bytes::from("t")));
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_file() {
        let (service, gateway) = service();
        let result = service
            .upload(
                TENANT,
                &path("docs/"),
                vec![UploadFile::new("ok.txt", "1"), UploadFile::new("empty.txt", "")],
            )
            .await;
        assert!(matches!(result, Err(CloudshelfError::EmptyResource(_))));
        // Files are written one by one; the one before the empty file stays.
        assert_eq!(
            gateway.keys(),
            vec!["user-1-files/", "user-1-files/docs/", "user-1-files/docs/ok.txt"]
        );
    }

    #[tokio::test]
    async fn test_upload_streams_chunks() {
        let (service, gateway) = service();
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::new()),
            Ok(Bytes::from("ab")),
            Ok(Bytes::new()),
            Ok(Bytes::from("cde")),
        ];

        let created = service
            .upload(
                TENANT,
                &ResourcePath::root(),
                vec![UploadFile::from_stream("s.txt", stream::iter(chunks))],
            )
            .await
            .unwrap();

        assert_eq!(created, vec![Resource::file(&path("s.txt"), 5)]);
        assert_eq!(gateway.content("user-1-files/s.txt"), Some(Bytes::from("abcde")));
    }

    #[tokio::test]
    async fn test_upload_of_only_empty_chunks_is_empty() {
        let (service, gateway) = service();
        let chunks: Vec<Result<Bytes>> = vec![Ok(Bytes::new()), Ok(Bytes::new())];

        let result = service
            .upload(
                TENANT,
                &ResourcePath::root(),
                vec![UploadFile::from_stream("e.txt", stream::iter(chunks))],
            )
            .await;

        assert!(matches!(result, Err(CloudshelfError::EmptyResource(_))));
        assert_eq!(gateway.keys(), vec!["user-1-files/"]);
    }

    #[tokio::test]
    async fn test_upload_body_error_is_returned_unchanged() {
        let (service, gateway) = service();
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from("partial")),
            Err(CloudshelfError::PayloadTooLarge("limit is 1 MB".to_string())),
        ];

        let result = service
            .upload(
                TENANT,
                &ResourcePath::root(),
                vec![UploadFile::from_stream("big.bin", stream::iter(chunks))],
            )
            .await;

        assert!(matches!(result, Err(CloudshelfError::PayloadTooLarge(_))));
        assert!(gateway.content("user-1-files/big.bin").is_none());
    }

    #[tokio::test]
    async fn test_upload_session_checks_each_file_before_its_write() {
        let (service, gateway) = service();
        gateway.insert("user-1-files/taken.txt", "t");

        let mut upload = service.begin_upload(TENANT, &ResourcePath::root()).unwrap();
        upload.write(UploadFile::new("first.txt", "1")).await.unwrap();
        assert!(matches!(
            upload.write(UploadFile::new("taken.txt", "2")).await,
            Err(CloudshelfError::ResourceAlreadyExist(_))
        ));
        upload.write(UploadFile::new("third.txt", "3")).await.unwrap();

        assert_eq!(
            upload.finish(),
            vec![
                Resource::file(&path("first.txt"), 1),
                Resource::file(&path("third.txt"), 1),
            ]
        );
        assert_eq!(gateway.content("user-1-files/taken.txt"), Some(Bytes::from("t")));
    }

    #[tokio::test]
    async fn test_begin_upload_requires_directory() {
        let (service, _) = service();
        assert!(matches!(
            service.begin_upload(TENANT, &path("a.txt")),
            Err(CloudshelfError::PathNotValid(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_rejects_collisions() {
        let (service, gateway) = service();
        seed_a(&gateway);

        let existing_file = service
            .upload(TENANT, &path("a/"), vec![UploadFile::new("x.txt", "new")])
            .await;
        assert!(matches!(
            existing_file,
            Err(CloudshelfError::ResourceAlreadyExist(_))
        ));
        assert_eq!(gateway.content("user-1-files/a/x.txt"), Some(Bytes::from("xx")));

        let existing_dir = service
            .upload(TENANT, &ResourcePath::root(), vec![UploadFile::new("a", "data")])
            .await;
        assert!(matches!(
            existing_dir,
            Err(CloudshelfError::ResourceAlreadyExist(_))
        ));

        let duplicate = service
            .upload(
                TENANT,
                &path("n/"),
                vec![UploadFile::new("d.txt", "1"), UploadFile::new("d.txt", "2")],
            )
            .await;
        assert!(matches!(
            duplicate,
            Err(CloudshelfError::ResourceAlreadyExist(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_rejects_escaping_filename() {
        let (service, _) = service();
        let result = service
            .upload(TENANT, &path("a/"), vec![UploadFile::new("../x.txt", "x")])
            .await;
        assert!(matches!(result, Err(CloudshelfError::PathNotValid(_))));
    }

    // ========================================================================
    // Download / search / provisioning
    // ========================================================================

    #[tokio::test]
    async fn test_download_file() {
        let (service, gateway) = service();
        seed_a(&gateway);

        let download = service.download(TENANT, &path("a/b/y.txt")).await.unwrap();
        assert_eq!(download.filename, "y.txt");
        assert_eq!(download.size, Some(3));
        let chunks: Vec<Bytes> = download.body.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"yyy");
    }

    #[tokio::test]
    async fn test_download_directory_as_zip() {
        let (service, gateway) = service();
        seed_a(&gateway);

        let download = service.download(TENANT, &path("/a/")).await.unwrap();
        assert_eq!(download.filename, "a.zip");
        let chunks: Vec<Bytes> = download.body.try_collect().await.unwrap();

        let reader = ZipFileReader::new(chunks.concat()).await.unwrap();
        let names: Vec<String> = reader
            .file()
            .entries()
            .iter()
            .map(|e| e.filename().as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["b/y.txt", "x.txt"]);
    }

    #[tokio::test]
    async fn test_download_root_is_named_files_zip() {
        let (service, gateway) = service();
        seed_a(&gateway);
        gateway.insert("user-1-files/top.txt", "t");

        let download = service.download(TENANT, &ResourcePath::root()).await.unwrap();
        assert_eq!(download.filename, "files.zip");
        assert_eq!(download.size, None);
        let chunks: Vec<Bytes> = download.body.try_collect().await.unwrap();

        let reader = ZipFileReader::new(chunks.concat()).await.unwrap();
        let names: Vec<String> = reader
            .file()
            .entries()
            .iter()
            .map(|e| e.filename().as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a/b/y.txt", "a/x.txt", "top.txt"]);
    }

    #[tokio::test]
    async fn test_download_missing() {
        let (service, _) = service();
        assert!(matches!(
            service.download(TENANT, &path("nope.txt")).await,
            Err(CloudshelfError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_matches_names_case_insensitively() {
        let (service, gateway) = service();
        gateway.insert("user-1-files/x/report.txt", "r1");
        gateway.insert("user-1-files/x/other.txt", "o");
        gateway.insert("user-1-files/y/z/Report2.csv", "r2");
        gateway.insert("user-1-files/reports/", Bytes::new());
        gateway.insert("user-2-files/report.txt", "foreign");

        let results = service.search(TENANT, "report").await.unwrap();
        assert_eq!(
            results,
            vec![
                Resource::directory(&path("reports/")),
                Resource::file(&path("x/report.txt"), 2),
                Resource::file(&path("y/z/Report2.csv"), 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_search_finds_reconstructed_directories() {
        let (service, gateway) = service();
        gateway.insert("user-1-files/projects/alpha/notes.md", "n");

        let results = service.search(TENANT, "alpha").await.unwrap();
        assert_eq!(results, vec![Resource::directory(&path("projects/alpha/"))]);
    }

    #[tokio::test]
    async fn test_search_candidate_removed_before_stat_is_not_found() {
        let (service, gateway) = faulty_service();
        gateway.inner.insert("user-1-files/x/report.txt", "r");
        gateway.lose("stat", "user-1-files/x/report.txt");

        assert!(matches!(
            service.search(TENANT, "report").await,
            Err(CloudshelfError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_rejects_invalid_query() {
        let (service, _) = service();
        assert!(matches!(
            service.search(TENANT, "").await,
            Err(CloudshelfError::QueryNotValid(_))
        ));
        assert!(matches!(
            service.search(TENANT, "a b").await,
            Err(CloudshelfError::QueryNotValid(_))
        ));
    }

    #[tokio::test]
    async fn test_provision_tenant_is_idempotent() {
        let gateway = Arc::new(InMemoryGateway::new());
        let service = ResourceService::new(gateway.clone(), namespace());

        assert!(service.provision_tenant(TenantId(5)).await.unwrap());
        assert!(!service.provision_tenant(TenantId(5)).await.unwrap());
        assert_eq!(gateway.keys(), vec!["user-5-files/"]);
    }
}
