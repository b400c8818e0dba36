//! Paginated prefix listing.

use crate::error::MirrorError;
use crate::store::ObjectStore;
use tracing::{debug, warn};

/// Lists every key under `prefix`, following continuation tokens.
///
/// Keys are returned in listing order with empty keys dropped. Store errors
/// are not retried and become [`MirrorError::Listing`].
///
/// # Arguments
///
/// * `store` - The store to list from
/// * `bucket` - The bucket name
/// * `prefix` - The effective prefix to list under
///
/// # Returns
///
/// Every key under `prefix`, or the first error the store reported.
pub async fn list_prefix(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<String>, MirrorError> {
    let mut keys = Vec::new();
    let mut continuation_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store
            .list_objects(bucket, prefix, continuation_token.as_deref())
            .await
            .map_err(|e| MirrorError::Listing {
                prefix: prefix.to_string(),
                message: e.to_string(),
            })?;
        pages += 1;
        debug!(prefix, page = pages, keys = page.keys.len(), "Listed page");

        keys.extend(page.keys.into_iter().filter(|key| !key.is_empty()));

        if !page.is_truncated {
            break;
        }
        match page.next_continuation_token {
            Some(token) => continuation_token = Some(token),
            None => {
                warn!(
                    prefix,
                    pages, "Listing reported truncation without a continuation token"
                );
                break;
            }
        }
    }

    debug!(prefix, pages, keys = keys.len(), "Finished listing prefix");
    Ok(keys)
}
