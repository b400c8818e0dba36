//! Body verification against S3 ETags.

use crate::error::MirrorError;
use md5::{Digest, Md5};

/// Incremental MD5 check of a streamed body.
///
/// S3's ETag is the hex MD5 of the body for single-part uploads. Multipart
/// ETags look like `<hash>-<parts>` and are not a digest of the body, so
/// they cannot be checked this way.
pub(crate) struct ChecksumVerifier {
    expected: String,
    hasher: Md5,
}

impl ChecksumVerifier {
    /// Returns a verifier for `etag`, or `None` if it is absent or multipart.
    pub(crate) fn from_etag(etag: Option<&str>) -> Option<Self> {
        let expected = etag?.trim_matches('"');
        if expected.is_empty() || expected.contains('-') {
            return None;
        }
        Some(Self {
            expected: expected.to_ascii_lowercase(),
            hasher: Md5::new(),
        })
    }

    pub(crate) fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Compares the digest of everything seen so far with the ETag.
    ///
    /// # Arguments
    ///
    /// * `key` - The key being verified, reported on mismatch
    ///
    /// # Returns
    ///
    /// `Ok(())` if the digests match, or [`MirrorError::ChecksumMismatch`].
    pub(crate) fn finish(self, key: &str) -> Result<(), MirrorError> {
        let actual = format!("{:x}", self.hasher.finalize());
        if actual != self.expected {
            return Err(MirrorError::ChecksumMismatch {
                key: key.to_string(),
                expected: self.expected,
                actual,
            });
        }
        Ok(())
    }
}
