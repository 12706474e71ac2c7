//! S3 / MinIO backend.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use s3::bucket_ops::BucketConfiguration;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::serde_types::ListBucketResult;
use s3::Bucket;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::gateway::{ByteStream, ObjectEntry, ObjectStoreError, ObjectStoreGateway, StorageResult};
use crate::config::StorageConfig;
use crate::{CloudshelfError, Result};

/// Declared payloads up to this size are sent in a single PUT; larger or undeclared ones
/// are streamed.
const SINGLE_PUT_LIMIT: u64 = 8 * 1024 * 1024;

/// Gateway over one S3-compatible bucket.
pub struct S3Gateway {
    bucket: Box<Bucket>,
    config: StorageConfig,
}

impl S3Gateway {
    /// Build a client for the configured bucket. No request is sent.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };
        let credentials = credentials(config)?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| CloudshelfError::Config(format!("invalid bucket settings: {e}")))?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            config: config.clone(),
        })
    }

    /// Make sure the bucket exists, creating it when allowed by configuration.
    pub async fn ensure_bucket(&self) -> Result<()> {
        let exists = self
            .bucket
            .exists()
            .await
            .map_err(|e| ObjectStoreError::backend("bucket-exists", &self.config.bucket, e))?;

        if exists {
            tracing::debug!(bucket = %self.config.bucket, "Bucket present");
            return Ok(());
        }

        if !self.config.create_bucket {
            return Err(CloudshelfError::Config(format!(
                "bucket {} does not exist and create_bucket is disabled",
                self.config.bucket
            )));
        }

        let region = Region::Custom {
            region: self.config.region.clone(),
            endpoint: self.config.endpoint.clone(),
        };
        let credentials = credentials(&self.config)?;
        let create = if self.config.path_style {
            Bucket::create_with_path_style(
                &self.config.bucket,
                region,
                credentials,
                BucketConfiguration::default(),
            )
            .await
        } else {
            Bucket::create(
                &self.config.bucket,
                region,
                credentials,
                BucketConfiguration::default(),
            )
            .await
        };
        create.map_err(|e| ObjectStoreError::backend("bucket-create", &self.config.bucket, e))?;

        tracing::info!(bucket = %self.config.bucket, "Created bucket");
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        recursive: bool,
        token: Option<String>,
        max_keys: Option<usize>,
    ) -> StorageResult<ListBucketResult> {
        let delimiter = (!recursive).then(|| "/".to_string());
        let (page, _) = self
            .bucket
            .list_page(prefix.to_string(), delimiter, token, None, max_keys)
            .await
            .map_err(|e| map_error("list", prefix, e))?;
        Ok(page)
    }
}

fn credentials(config: &StorageConfig) -> Result<Credentials> {
    Credentials::new(
        Some(&config.access_key),
        Some(&config.secret_key),
        None,
        None,
        None,
    )
    .map_err(|e| CloudshelfError::Config(format!("invalid storage credentials: {e}")))
}

fn map_error(op: &'static str, key: &str, err: S3Error) -> ObjectStoreError {
    match err {
        S3Error::HttpFailWithBody(404, _) => ObjectStoreError::no_such_key(op, key),
        other => ObjectStoreError::backend(op, key, other),
    }
}

/// Objects and common prefixes of one page, merged back into key order.
fn page_entries(page: ListBucketResult) -> Vec<ObjectEntry> {
    let mut entries: Vec<ObjectEntry> = page
        .contents
        .into_iter()
        .map(|object| ObjectEntry::new(object.key, object.size))
        .collect();
    entries.extend(
        page.common_prefixes
            .unwrap_or_default()
            .into_iter()
            .map(|common| ObjectEntry::new(common.prefix, 0)),
    );
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    entries
}

#[async_trait]
impl ObjectStoreGateway for S3Gateway {
    async fn get(&self, key: &str) -> StorageResult<ByteStream> {
        tracing::debug!(key, "get");
        let response = self
            .bucket
            .get_object_stream(key)
            .await
            .map_err(|e| map_error("get", key, e))?;

        let owned_key = key.to_string();
        Ok(response
            .bytes
            .map_err(move |e| ObjectStoreError::backend("get", owned_key.clone(), e))
            .boxed())
    }

    async fn stat(&self, key: &str) -> StorageResult<u64> {
        tracing::debug!(key, "stat");
        let (head, _) = self
            .bucket
            .head_object(key)
            .await
            .map_err(|e| map_error("stat", key, e))?;
        Ok(head.content_length.unwrap_or(0).max(0) as u64)
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, StorageResult<ObjectEntry>> {
        tracing::debug!(prefix, recursive, "list");
        // `Some(token)` while pages remain; the first page has no token.
        stream::try_unfold(Some(None::<String>), move |state| async move {
            let Some(token) = state else {
                return Ok::<_, ObjectStoreError>(None);
            };
            let page = self.list_page(prefix, recursive, token, None).await?;
            let next = if page.is_truncated {
                page.next_continuation_token.clone().map(Some)
            } else {
                None
            };
            let entries = page_entries(page);
            Ok(Some((stream::iter(entries.into_iter().map(Ok::<_, ObjectStoreError>)), next)))
        })
        .try_flatten()
        .boxed()
    }

    async fn put(
        &self,
        key: &str,
        mut body: &mut (dyn AsyncRead + Unpin + Send),
        size: Option<u64>,
    ) -> StorageResult<()> {
        tracing::debug!(key, size, "put");
        match size {
            Some(size) if size <= SINGLE_PUT_LIMIT => {
                let mut buf = Vec::with_capacity(size as usize);
                body.read_to_end(&mut buf)
                    .await
                    .map_err(|e| ObjectStoreError::backend("put", key, e))?;
                self.bucket
                    .put_object(key, &buf)
                    .await
                    .map_err(|e| map_error("put", key, e))?;
            }
            // Read in part-sized chunks by the client; never held whole.
            _ => {
                self.bucket
                    .put_object_stream(&mut body, key)
                    .await
                    .map_err(|e| map_error("put", key, e))?;
            }
        }
        Ok(())
    }

    async fn copy(&self, source: &str, dest: &str) -> StorageResult<()> {
        tracing::debug!(source, dest, "copy");
        self.bucket
            .copy_object_internal(source, dest)
            .await
            .map_err(|e| map_error("copy", source, e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        tracing::debug!(key, "delete");
        self.bucket
            .delete_object(key)
            .await
            .map_err(|e| map_error("delete", key, e))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        if key.ends_with('/') {
            let page = self.list_page(key, false, None, Some(1)).await?;
            return Ok(!page.contents.is_empty()
                || page.common_prefixes.is_some_and(|p| !p.is_empty()));
        }

        match self.stat(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
