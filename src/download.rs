//! Materialization of keys onto the local filesystem.

use crate::error::MirrorError;
use crate::path::PathMapper;
use crate::store::{BodyStream, ObjectStore};
use crate::types::{DownloadOutcome, OutcomeStatus, RemoteKey};
use crate::verify::ChecksumVerifier;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{info, warn};

/// Writes remote keys under the working directory.
///
/// Directory markers become empty directories. Content keys are streamed to
/// a part file next to the target once the store has returned a body and the
/// parent directories exist, then renamed over the target.
#[derive(Clone)]
pub struct Materializer {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    mapper: PathMapper,
    verify_checksums: bool,
}

impl Materializer {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        mapper: PathMapper,
        verify_checksums: bool,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            mapper,
            verify_checksums,
        }
    }

    /// Materializes one key.
    ///
    /// An object the store cannot serve (non-success status or no body) is
    /// reported as [`OutcomeStatus::Skipped`] rather than an error. A failed
    /// or cancelled download leaves any existing file at the target path as
    /// it was.
    ///
    /// # Arguments
    ///
    /// * `key` - A key from the deduplicated listing
    ///
    /// # Returns
    ///
    /// The outcome for `key`, or the error that should abort the run.
    pub async fn materialize(&self, key: RemoteKey) -> Result<DownloadOutcome, MirrorError> {
        let local_path = self.mapper.map(key.as_str())?;
        match key {
            RemoteKey::Directory(_) => create_directory(key, local_path).await,
            RemoteKey::Content(_) => self.download(key, local_path).await,
        }
    }

    async fn download(
        &self,
        key: RemoteKey,
        local_path: PathBuf,
    ) -> Result<DownloadOutcome, MirrorError> {
        let object = self
            .store
            .get_object(&self.bucket, key.as_str())
            .await
            .map_err(|e| MirrorError::Fetch {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let status = object.status;
        let success = object.is_success();
        let body = match object.body {
            Some(body) if success => body,
            _ => {
                let reason = if success {
                    "no body returned".to_string()
                } else {
                    format!("store returned status {}", status)
                };
                warn!("Skipped {}: {}", key, reason);
                return Ok(DownloadOutcome {
                    key,
                    local_path,
                    bytes_written: 0,
                    status: OutcomeStatus::Skipped(reason),
                });
            }
        };

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MirrorError::write(parent, e))?;
        }

        let verifier = if self.verify_checksums {
            ChecksumVerifier::from_etag(object.etag.as_deref())
        } else {
            None
        };

        let bytes_written =
            stream_to_file(key.as_str(), &local_path, body, object.content_length, verifier)
                .await?;
        info!("Downloaded: {}", local_path.display());

        Ok(DownloadOutcome {
            key,
            local_path,
            bytes_written,
            status: OutcomeStatus::Downloaded,
        })
    }
}

async fn create_directory(
    key: RemoteKey,
    local_path: PathBuf,
) -> Result<DownloadOutcome, MirrorError> {
    tokio::fs::create_dir_all(&local_path)
        .await
        .map_err(|e| MirrorError::write(&local_path, e))?;
    info!("Created directory: {}", local_path.display());

    Ok(DownloadOutcome {
        key,
        local_path,
        bytes_written: 0,
        status: OutcomeStatus::DirectoryCreated,
    })
}

/// Suffix of the sibling file a body is streamed into before it is renamed.
const PART_SUFFIX: &str = ".s3mirror-part";

/// A partially written file that is removed unless it is committed.
///
/// Removal happens on drop, so a download cancelled mid-stream by a failing
/// sibling leaves nothing behind either.
struct PartFile {
    path: PathBuf,
    committed: bool,
}

impl PartFile {
    fn for_target(target: &Path) -> Self {
        let mut name = target.file_name().unwrap_or_default().to_os_string();
        name.push(PART_SUFFIX);
        Self {
            path: target.with_file_name(name),
            committed: false,
        }
    }

    async fn commit(mut self, target: &Path) -> Result<(), MirrorError> {
        tokio::fs::rename(&self.path, target)
            .await
            .map_err(|e| MirrorError::write(target, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Streams `body` into `path`.
///
/// The bytes go to a sibling part file that replaces `path` only once the
/// body has been flushed and checked, so `path` never holds a truncated body.
///
/// # Arguments
///
/// * `key` - The remote key, used in error messages
/// * `path` - The final local path
/// * `body` - The object body
/// * `content_length` - The size announced by the store, if any
/// * `verifier` - MD5 check to apply, if enabled and possible
///
/// # Returns
///
/// The number of bytes written, or an error if reading, writing, the
/// length check or the checksum check fails.
async fn stream_to_file(
    key: &str,
    path: &Path,
    mut body: BodyStream,
    content_length: Option<u64>,
    mut verifier: Option<ChecksumVerifier>,
) -> Result<u64, MirrorError> {
    let part = PartFile::for_target(path);
    let file = tokio::fs::File::create(&part.path)
        .await
        .map_err(|e| MirrorError::write(&part.path, e))?;
    let mut file = BufWriter::new(file);
    let mut written = 0u64;

    while let Some(piece) = body.next().await {
        let chunk = piece.map_err(|e| MirrorError::Fetch {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        if let Some(ref mut v) = verifier {
            v.update(&chunk);
        }

        file.write_all(&chunk)
            .await
            .map_err(|e| MirrorError::write(&part.path, e))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| MirrorError::write(&part.path, e))?;
    drop(file);

    if let Some(expected) = content_length {
        if written != expected {
            return Err(MirrorError::Fetch {
                key: key.to_string(),
                message: format!(
                    "size mismatch: expected {} bytes, received {}",
                    expected, written
                ),
            });
        }
    }

    if let Some(verifier) = verifier {
        verifier.finish(key)?;
    }

    part.commit(path).await?;
    Ok(written)
}
