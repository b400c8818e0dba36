//! Merging and deduplication of listed keys.

use crate::types::RemoteKey;
use std::collections::BTreeSet;
use std::ops::Bound;
use tracing::debug;

/// Merges per-prefix listings into the minimal set of keys to materialize.
///
/// Exact duplicates are collapsed first. A directory marker is then dropped
/// when some longer key starts with it, because materializing that key
/// creates the directory anyway. Markers with nothing beneath them are kept.
/// Content keys are never dropped.
///
/// The result is sorted lexicographically.
///
/// # Example
///
/// ```
/// use s3mirror::{merge_keys, RemoteKey};
///
/// let keys = merge_keys(vec![
///     vec!["a/".to_string(), "a/b.txt".to_string()],
///     vec!["a/b.txt".to_string(), "c/".to_string()],
/// ]);
/// assert_eq!(
///     keys,
///     vec![RemoteKey::classify("a/b.txt"), RemoteKey::classify("c/")]
/// );
/// ```
pub fn merge_keys<I>(listings: I) -> Vec<RemoteKey>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let unique: BTreeSet<String> = listings
        .into_iter()
        .flatten()
        .filter(|key| !key.is_empty())
        .collect();

    let keys: Vec<RemoteKey> = unique
        .iter()
        .filter(|key| !key.ends_with('/') || !has_descendant(&unique, key))
        .cloned()
        .map(RemoteKey::classify)
        .collect();

    debug!(
        unique = unique.len(),
        kept = keys.len(),
        "Collapsed directory markers"
    );
    keys
}

/// Whether any key in the set extends `marker`.
///
/// Keys sharing a prefix are contiguous in sorted order and follow it
/// immediately, so only the successor needs checking.
fn has_descendant(keys: &BTreeSet<String>, marker: &str) -> bool {
    keys.range::<str, _>((Bound::Excluded(marker), Bound::Unbounded))
        .next()
        .is_some_and(|next| next.starts_with(marker))
}
