//! Data structures for mirror operations.

use serde::Serialize;
use std::path::PathBuf;

/// Configuration for a mirror run.
///
/// # Example
///
/// ```
/// use s3mirror::MirrorConfig;
///
/// let config = MirrorConfig {
///     bucket: "artifacts".to_string(),
///     prefix: "releases".to_string(),
///     selectors: vec!["v1".to_string(), "v2".to_string()],
///     max_concurrent_downloads: 32,
///     ..Default::default()
/// };
/// assert_eq!(config.max_concurrent_listings, 8);
/// ```
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Bucket to mirror from.
    pub bucket: String,
    /// Shared prefix prepended to every selector (may be empty).
    pub prefix: String,
    /// Path selectors, in the order given by the caller. Duplicates are allowed.
    pub selectors: Vec<String>,
    /// Directory the key hierarchy is reproduced under.
    pub working_dir: PathBuf,
    /// Maximum number of prefixes listed at once (default: 8).
    pub max_concurrent_listings: usize,
    /// Maximum number of keys materialized at once (default: 16).
    ///
    /// Downloads are I/O-bound, so this is limited by network bandwidth and
    /// open file handles rather than CPU cores.
    pub max_concurrent_downloads: usize,
    /// Verify the MD5 of each body against single-part ETags (default: false).
    ///
    /// Objects encrypted with SSE-KMS carry ETags that are not MD5 digests,
    /// so this is opt-in.
    pub verify_checksums: bool,
    /// Draw a progress bar on stderr while downloading (default: false).
    pub show_progress: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: String::new(),
            selectors: Vec::new(),
            working_dir: PathBuf::from("."),
            max_concurrent_listings: 8,
            max_concurrent_downloads: 16,
            verify_checksums: false,
            show_progress: false,
        }
    }
}

/// A key returned by the object store.
///
/// Keys ending in `/` are zero-byte directory markers; all other keys carry
/// content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RemoteKey {
    /// A directory marker such as `logs/2024/`.
    Directory(String),
    /// An object with a body such as `logs/2024/app.log`.
    Content(String),
}

impl RemoteKey {
    /// Classifies a raw key by its trailing separator.
    pub fn classify(key: impl Into<String>) -> Self {
        let key = key.into();
        if key.ends_with('/') {
            Self::Directory(key)
        } else {
            Self::Content(key)
        }
    }

    /// The raw key as stored in the bucket.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Directory(key) | Self::Content(key) => key,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }
}

impl std::fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One response from a listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Keys on this page, in listing order. May contain empty strings.
    pub keys: Vec<String>,
    /// Cursor for the next page, if any.
    pub next_continuation_token: Option<String>,
    /// Whether more pages follow.
    pub is_truncated: bool,
}

/// What happened to a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// The body was streamed to disk.
    Downloaded,
    /// A directory marker was materialized as an empty directory.
    DirectoryCreated,
    /// The store returned no usable body; nothing was written.
    Skipped(String),
}

/// Result of materializing one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub key: RemoteKey,
    pub local_path: PathBuf,
    pub bytes_written: u64,
    pub status: OutcomeStatus,
}

/// Totals for a completed run.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct MirrorSummary {
    pub bucket: String,
    /// Number of distinct effective prefixes listed.
    pub prefixes_listed: usize,
    /// Keys returned across all listings, before deduplication.
    pub keys_listed: usize,
    /// Keys left after deduplication.
    pub keys_unique: usize,
    pub files_written: usize,
    pub directories_created: usize,
    pub skipped: usize,
    pub bytes_written: u64,
    pub elapsed_secs: f64,
}

impl MirrorSummary {
    /// Folds one outcome into the totals.
    pub(crate) fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome.status {
            OutcomeStatus::Downloaded => self.files_written += 1,
            OutcomeStatus::DirectoryCreated => self.directories_created += 1,
            OutcomeStatus::Skipped(_) => self.skipped += 1,
        }
        self.bytes_written += outcome.bytes_written;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_uses_trailing_separator() {
        assert_eq!(
            RemoteKey::classify("a/b/"),
            RemoteKey::Directory("a/b/".to_string())
        );
        assert_eq!(
            RemoteKey::classify("a/b.txt"),
            RemoteKey::Content("a/b.txt".to_string())
        );
        assert!(RemoteKey::classify("dir/").is_directory());
        assert_eq!(RemoteKey::classify("x/y").as_str(), "x/y");
    }

    #[test]
    fn test_summary_record() {
        let mut summary = MirrorSummary::default();
        summary.record(&DownloadOutcome {
            key: RemoteKey::classify("a.bin"),
            local_path: PathBuf::from("a.bin"),
            bytes_written: 10,
            status: OutcomeStatus::Downloaded,
        });
        summary.record(&DownloadOutcome {
            key: RemoteKey::classify("d/"),
            local_path: PathBuf::from("d"),
            bytes_written: 0,
            status: OutcomeStatus::DirectoryCreated,
        });
        summary.record(&DownloadOutcome {
            key: RemoteKey::classify("gone.bin"),
            local_path: PathBuf::from("gone.bin"),
            bytes_written: 0,
            status: OutcomeStatus::Skipped("no body".to_string()),
        });

        assert_eq!(summary.files_written, 1);
        assert_eq!(summary.directories_created, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.bytes_written, 10);
    }
}
