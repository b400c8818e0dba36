//! Error types for mirror operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while mirroring a bucket.
///
/// The pipeline is fail-fast: the first error raised by any listing or
/// download aborts the run and is the one reported.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Listing a prefix failed (transport or authorization).
    #[error("Failed to list prefix '{prefix}': {message}")]
    Listing { prefix: String, message: String },

    /// Fetching or reading an object body failed.
    #[error("Failed to fetch '{key}': {message}")]
    Fetch { key: String, message: String },

    /// Creating a directory or writing a file failed.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A key maps to a location outside the working directory.
    #[error("Refusing to materialize '{key}': {reason}")]
    PathSafety { key: String, reason: String },

    /// The streamed body does not match the object's ETag.
    #[error("MD5 mismatch for '{key}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    /// A task in a concurrent stage could not be joined.
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl MirrorError {
    /// Wraps an I/O error raised while writing `path`.
    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn path_safety(key: &str, reason: impl Into<String>) -> Self {
        Self::PathSafety {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
