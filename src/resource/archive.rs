//! Streaming zip assembly for directory downloads.

use std::sync::Arc;

use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use bytes::Bytes;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use futures::AsyncWriteExt;
use tokio::io::DuplexStream;
use tokio_util::io::ReaderStream;

use crate::storage::ObjectStoreGateway;
use crate::{CloudshelfError, Result};

/// Bytes buffered between the archive writer and the consumer.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Produces a zip archive of everything under a directory prefix.
///
/// The archive is written by a background task into a bounded pipe, so the writer only
/// advances as fast as the consumer reads. Dropping the returned stream closes the pipe
/// and the writer task fails on its next write.
#[derive(Clone)]
pub struct ZipStreamer {
    gateway: Arc<dyn ObjectStoreGateway>,
}

impl ZipStreamer {
    pub fn new(gateway: Arc<dyn ObjectStoreGateway>) -> Self {
        Self { gateway }
    }

    /// Stream a zip of every object under `prefix`, named relative to it.
    ///
    /// Directory markers are skipped. A failure while assembling the archive is reported
    /// as the final item of the stream.
    pub fn stream(&self, prefix: String) -> BoxStream<'static, Result<Bytes>> {
        let (sink, source) = tokio::io::duplex(PIPE_CAPACITY);
        let gateway = Arc::clone(&self.gateway);

        let task = tokio::spawn(async move {
            let result = write_archive(gateway.as_ref(), &prefix, sink).await;
            if let Err(e) = &result {
                tracing::warn!(prefix = %prefix, error = %e, "Zip archive aborted");
            }
            result
        });

        let body = ReaderStream::new(source).map_err(CloudshelfError::from);
        let outcome = stream::once(async move {
            match task.await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(Err(e)),
                Err(e) => Some(Err(CloudshelfError::Archive(e.to_string()))),
            }
        })
        .filter_map(future::ready);

        body.chain(outcome).boxed()
    }
}

async fn write_archive(
    gateway: &dyn ObjectStoreGateway,
    prefix: &str,
    sink: DuplexStream,
) -> Result<()> {
    let mut zip = ZipFileWriter::with_tokio(sink);
    let mut listing = gateway.list(prefix, true);
    let mut entries = 0usize;

    while let Some(entry) = listing.try_next().await? {
        if entry.is_dir {
            continue;
        }
        let Some(name) = entry.key.strip_prefix(prefix) else {
            continue;
        };

        let mut body = gateway.get(&entry.key).await?;
        let builder = ZipEntryBuilder::new(name.to_string().into(), Compression::Deflate);
        let mut writer = zip.write_entry_stream(builder).await?;
        while let Some(chunk) = body.try_next().await? {
            writer.write_all(&chunk).await?;
        }
        writer.close().await?;
        entries += 1;
    }

    zip.close().await?;
    tracing::debug!(prefix, entries, "Zip archive complete");
    Ok(())
}
