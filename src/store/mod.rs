//! Object store boundary.
//!
//! The pipeline only needs two operations from a bucket: a paginated listing
//! and a streamed object fetch. [`ObjectStore`] captures those so the run can
//! be driven by the AWS SDK ([`S3Store`]) or an in-memory bucket
//! ([`MemoryStore`]).

pub mod memory;
pub mod s3;

pub use memory::MemoryStore;
pub use s3::{S3Options, S3Store};

use crate::types::ListingPage;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use std::io;
use thiserror::Error;

/// Streamed object body.
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

/// Error reported by an [`ObjectStore`] implementation.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response to a fetch request.
pub struct FetchedObject {
    /// HTTP-style status code. Anything outside 2xx means "no content".
    pub status: u16,
    /// Size announced by the store, when known.
    pub content_length: Option<u64>,
    /// Raw ETag, usually quoted.
    pub etag: Option<String>,
    pub body: Option<BodyStream>,
}

impl FetchedObject {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for FetchedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedObject")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("etag", &self.etag)
            .field("body", &self.body.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

/// Read access to a bucket-based object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists one page of keys under `prefix`.
    ///
    /// Pass the previous page's continuation token to get the next page.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListingPage, StoreError>;

    /// Fetches the body of `key`.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<FetchedObject, StoreError>;
}
