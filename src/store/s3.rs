//! AWS S3 implementation of [`ObjectStore`].

use super::{FetchedObject, ObjectStore, StoreError};
use crate::types::ListingPage;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use futures_util::stream;
use std::io;
use tracing::debug;

/// Options for building the S3 client.
///
/// Anything left unset falls back to the SDK's default provider chain
/// (environment, shared config files, instance metadata).
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    /// AWS region, e.g. `eu-west-1`.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, LocalStack).
    pub endpoint_url: Option<String>,
    /// Named profile from the shared config files.
    pub profile: Option<String>,
}

/// [`ObjectStore`] backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Wraps an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Loads SDK configuration and builds a client.
    ///
    /// A custom endpoint switches the client to path-style addressing, which
    /// most S3-compatible stores require.
    pub async fn connect(options: &S3Options) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = &options.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = &options.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &options.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        debug!(
            region = ?sdk_config.region(),
            endpoint = ?options.endpoint_url,
            "Built S3 client"
        );

        Self::new(Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListingPage, StoreError> {
        let mut request = self.client.list_objects_v2().bucket(bucket);
        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }
        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let response = request.send().await.map_err(|e| {
            StoreError::new(format!("S3 list objects failed: {}", DisplayErrorContext(&e)))
        })?;

        let keys = response
            .contents()
            .iter()
            .filter_map(|obj| obj.key())
            .map(str::to_string)
            .collect();

        Ok(ListingPage {
            keys,
            next_continuation_token: response.next_continuation_token().map(str::to_string),
            is_truncated: response.is_truncated().unwrap_or(false),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<FetchedObject, StoreError> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(e) => {
                // Deleted between listing and fetch.
                if let Some(404) = e.raw_response().map(|r| r.status().as_u16()) {
                    return Ok(FetchedObject {
                        status: 404,
                        content_length: None,
                        etag: None,
                        body: None,
                    });
                }
                return Err(StoreError::new(format!(
                    "S3 get object failed: {}",
                    DisplayErrorContext(&e)
                )));
            }
        };

        let content_length = output.content_length().and_then(|l| u64::try_from(l).ok());
        let etag = output.e_tag().map(str::to_string);
        let body = stream::unfold(output.body, |mut body| async move {
            body.next()
                .await
                .map(|chunk| (chunk.map_err(io::Error::other), body))
        });

        Ok(FetchedObject {
            status: 200,
            content_length,
            etag,
            body: Some(Box::pin(body)),
        })
    }
}
