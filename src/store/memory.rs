//! In-memory implementation of [`ObjectStore`].

use super::{FetchedObject, ObjectStore, StoreError};
use crate::types::ListingPage;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_PAGE_SIZE: usize = 1000;
const CHUNK_SIZE: usize = 64 * 1024;

/// A single bucket held in memory.
///
/// Listings are paginated like S3: keys come back in lexicographic order,
/// `page_size` at a time, and the continuation token is the last key of the
/// previous page. Bodies are streamed in 64 KiB chunks with an MD5 ETag.
///
/// # Example
///
/// ```
/// use s3mirror::MemoryStore;
///
/// let store = MemoryStore::new("artifacts")
///     .with_page_size(2)
///     .with_object("releases/v1/app.bin", b"binary".to_vec())
///     .with_object("releases/v1/docs/", Vec::new());
/// assert_eq!(store.len(), 2);
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    bucket: String,
    objects: BTreeMap<String, Bytes>,
    page_size: usize,
    list_requests: AtomicUsize,
    get_requests: AtomicUsize,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: BTreeMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            list_requests: AtomicUsize::new(0),
            get_requests: AtomicUsize::new(0),
        }
    }

    /// Sets the maximum number of keys per listing page (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_object(mut self, key: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.insert(key, body);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, body: impl Into<Bytes>) {
        self.objects.insert(key.into(), body.into());
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of listing requests served so far.
    pub fn list_requests(&self) -> usize {
        self.list_requests.load(Ordering::Relaxed)
    }

    /// Number of fetch requests served so far.
    pub fn get_requests(&self) -> usize {
        self.get_requests.load(Ordering::Relaxed)
    }

    fn check_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        if bucket == self.bucket {
            Ok(())
        } else {
            Err(StoreError::new(format!(
                "NoSuchBucket: the bucket '{}' does not exist",
                bucket
            )))
        }
    }
}

/// Quoted hex MD5 of `body`, as S3 reports it for single-part uploads.
pub(crate) fn etag_for(body: &[u8]) -> String {
    format!("\"{:x}\"", Md5::digest(body))
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListingPage, StoreError> {
        self.check_bucket(bucket)?;
        self.list_requests.fetch_add(1, Ordering::Relaxed);

        let start = match continuation_token {
            Some(token) => Bound::Excluded(token),
            None => Bound::Included(prefix),
        };
        let mut matching = self
            .objects
            .range::<str, _>((start, Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix));

        let keys: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let is_truncated = matching.next().is_some();
        let next_continuation_token = if is_truncated {
            keys.last().cloned()
        } else {
            None
        };

        Ok(ListingPage {
            keys,
            next_continuation_token,
            is_truncated,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<FetchedObject, StoreError> {
        self.check_bucket(bucket)?;
        self.get_requests.fetch_add(1, Ordering::Relaxed);

        let Some(body) = self.objects.get(key).cloned() else {
            return Ok(FetchedObject {
                status: 404,
                content_length: None,
                etag: None,
                body: None,
            });
        };

        let chunks: Vec<std::io::Result<Bytes>> = (0..body.len())
            .step_by(CHUNK_SIZE)
            .map(|start| Ok(body.slice(start..body.len().min(start + CHUNK_SIZE))))
            .collect();

        Ok(FetchedObject {
            status: 200,
            content_length: Some(body.len() as u64),
            etag: Some(etag_for(&body)),
            body: Some(Box::pin(stream::iter(chunks))),
        })
    }
}
