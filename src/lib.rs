//! s3mirror - Mirror selected prefixes of an S3 bucket onto the local filesystem
//!
//! This library lists one or more prefixes of a bucket, collapses the keys
//! into a minimal set and reproduces the key hierarchy as a directory tree.
//!
//! # Features
//!
//! - **Paginated Listing**: Follows continuation tokens until every key is seen
//! - **Marker Collapsing**: Skips directory markers already implied by deeper keys
//! - **Path Safety**: Refuses keys that would land outside the working directory
//! - **Bounded Concurrency**: Listing and downloading run in capped task groups
//! - **Fail-Fast**: The first error aborts the run and cancels in-flight work
//! - **Optional MD5 Verification**: Checks bodies against single-part ETags
//!
//! # Example
//!
//! ```no_run
//! use s3mirror::{Mirror, MirrorConfig, S3Options, S3Store};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = S3Store::connect(&S3Options::default()).await;
//! let config = MirrorConfig {
//!     bucket: "artifacts".to_string(),
//!     selectors: vec!["docs".to_string()],
//!     ..Default::default()
//! };
//!
//! Mirror::new(Arc::new(store), config).run().await?;
//! # Ok(())
//! # }
//! ```

mod dedup;
mod download;
mod error;
mod lister;
mod orchestrator;
mod path;
mod pool;
mod prefix;
mod progress;
pub mod store;
mod types;
mod verify;

pub use dedup::merge_keys;
pub use download::Materializer;
pub use error::MirrorError;
pub use lister::list_prefix;
pub use orchestrator::Mirror;
pub use path::PathMapper;
pub use prefix::{parse_selectors, resolve_prefixes};
pub use progress::stderr_is_terminal;
pub use store::{FetchedObject, MemoryStore, ObjectStore, S3Options, S3Store, StoreError};
pub use types::{
    DownloadOutcome, ListingPage, MirrorConfig, MirrorSummary, OutcomeStatus, RemoteKey,
};
