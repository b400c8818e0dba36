//! Main orchestration logic for mirroring a bucket.

use crate::dedup::merge_keys;
use crate::download::Materializer;
use crate::error::MirrorError;
use crate::lister::list_prefix;
use crate::path::PathMapper;
use crate::pool::try_join_bounded;
use crate::prefix::resolve_prefixes;
use crate::progress::download_bar;
use crate::store::ObjectStore;
use crate::types::{MirrorConfig, MirrorSummary};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A single mirror run against one bucket.
///
/// The store handle is owned for the lifetime of the run, so any
/// [`ObjectStore`] (including [`MemoryStore`](crate::MemoryStore)) can drive
/// it.
///
/// # Example
///
/// ```no_run
/// use s3mirror::{Mirror, MirrorConfig, S3Options, S3Store};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = S3Store::connect(&S3Options::default()).await;
/// let config = MirrorConfig {
///     bucket: "artifacts".to_string(),
///     prefix: "releases".to_string(),
///     selectors: vec!["v1".to_string()],
///     ..Default::default()
/// };
/// let summary = Mirror::new(Arc::new(store), config).run().await?;
/// println!("{} file(s) written", summary.files_written);
/// # Ok(())
/// # }
/// ```
pub struct Mirror {
    store: Arc<dyn ObjectStore>,
    config: MirrorConfig,
}

impl Mirror {
    pub fn new(store: Arc<dyn ObjectStore>, config: MirrorConfig) -> Self {
        Self { store, config }
    }

    /// Lists every selected prefix, then materializes the deduplicated keys.
    ///
    /// Downloading starts only after all listings have completed, since the
    /// deduplication needs the full key set. Either stage stops at its first
    /// error; files written before that point stay on disk.
    ///
    /// # Returns
    ///
    /// Counts for the whole run, or the first listing or materialization
    /// error.
    pub async fn run(&self) -> Result<MirrorSummary, MirrorError> {
        let started = Instant::now();
        let config = &self.config;

        let prefixes = resolve_prefixes(&config.prefix, &config.selectors);
        info!(
            "Listing {} prefix(es) in bucket {}",
            prefixes.len(),
            config.bucket
        );

        let store = Arc::clone(&self.store);
        let bucket = config.bucket.clone();
        let listings = try_join_bounded(config.max_concurrent_listings, prefixes.clone(), |prefix| {
            let store = Arc::clone(&store);
            let bucket = bucket.clone();
            async move { list_prefix(store.as_ref(), &bucket, &prefix).await }
        })
        .await?;

        let keys_listed: usize = listings.iter().map(Vec::len).sum();
        let keys = merge_keys(listings);
        info!(
            "Found {} key(s), {} after deduplication",
            keys_listed,
            keys.len()
        );

        let mut summary = MirrorSummary {
            bucket: config.bucket.clone(),
            prefixes_listed: prefixes.len(),
            keys_listed,
            keys_unique: keys.len(),
            ..Default::default()
        };

        let working_dir = self.prepare_working_dir().await?;
        debug!(working_dir = %working_dir.display(), "Materializing keys");
        let materializer = Materializer::new(
            Arc::clone(&self.store),
            config.bucket.clone(),
            PathMapper::new(working_dir, config.prefix.clone()),
            config.verify_checksums,
        );

        let pb = download_bar(keys.len() as u64, config.show_progress);
        let outcomes = try_join_bounded(config.max_concurrent_downloads, keys, |key| {
            let materializer = materializer.clone();
            let pb = pb.clone();
            async move {
                let outcome = materializer.materialize(key).await?;
                pb.inc(1);
                Ok(outcome)
            }
        })
        .await
        .inspect_err(|_| pb.abandon_with_message("❌ Mirror failed!"))?;

        for outcome in &outcomes {
            summary.record(outcome);
        }
        summary.elapsed_secs = started.elapsed().as_secs_f64();

        pb.finish_with_message(format!(
            "✅ Mirrored {} file(s), {} skipped",
            summary.files_written, summary.skipped
        ));
        info!(
            "Mirrored {} file(s) and {} directory marker(s), {} bytes in {}",
            summary.files_written,
            summary.directories_created,
            summary.bytes_written,
            humantime::format_duration(Duration::from_millis(started.elapsed().as_millis() as u64))
        );

        Ok(summary)
    }

    /// Creates the working directory if needed and returns its canonical form.
    async fn prepare_working_dir(&self) -> Result<PathBuf, MirrorError> {
        let dir = &self.config.working_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| MirrorError::write(dir, e))?;
        tokio::fs::canonicalize(dir)
            .await
            .map_err(|e| MirrorError::write(dir, e))
    }
}
