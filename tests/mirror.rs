//! End-to-end runs of the mirror pipeline against an in-memory bucket.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use s3mirror::{
    FetchedObject, ListingPage, MemoryStore, Mirror, MirrorConfig, MirrorError, ObjectStore,
    StoreError,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Wraps a [`MemoryStore`] and fails or hides selected requests.
struct FaultyStore {
    inner: MemoryStore,
    failing_prefixes: Vec<String>,
    failing_keys: Vec<String>,
    vanished_keys: Vec<String>,
}

impl FaultyStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing_prefixes: Vec::new(),
            failing_keys: Vec::new(),
            vanished_keys: Vec::new(),
        }
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListingPage, StoreError> {
        if self.failing_prefixes.iter().any(|p| p == prefix) {
            return Err(StoreError::new("AccessDenied: listing not allowed"));
        }
        self.inner
            .list_objects(bucket, prefix, continuation_token)
            .await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<FetchedObject, StoreError> {
        if self.failing_keys.iter().any(|k| k == key) {
            return Err(StoreError::new("connection reset by peer"));
        }
        if self.vanished_keys.iter().any(|k| k == key) {
            return Ok(FetchedObject {
                status: 404,
                content_length: None,
                etag: None,
                body: None,
            });
        }
        self.inner.get_object(bucket, key).await
    }
}

fn config(dir: &Path, prefix: &str, selectors: &[&str]) -> MirrorConfig {
    MirrorConfig {
        bucket: "artifacts".to_string(),
        prefix: prefix.to_string(),
        selectors: selectors.iter().map(|s| s.to_string()).collect(),
        working_dir: dir.to_path_buf(),
        max_concurrent_listings: 4,
        max_concurrent_downloads: 4,
        ..Default::default()
    }
}

/// Relative path -> contents for every file under `root`; directories map to `None`.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Option<Vec<u8>>>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            let relative = path.strip_prefix(root).unwrap().to_path_buf();
            if path.is_dir() {
                out.insert(relative, None);
                walk(root, &path, out);
            } else {
                out.insert(relative, Some(std::fs::read(&path).unwrap()));
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

fn release_bucket() -> MemoryStore {
    MemoryStore::new("artifacts")
        .with_page_size(3)
        .with_object("releases/v1/", "")
        .with_object("releases/v1/app.bin", vec![1u8; 200_000])
        .with_object("releases/v1/docs/", "")
        .with_object("releases/v1/docs/readme.md", "# v1")
        .with_object("releases/v1/empty/", "")
        .with_object("releases/v2/app.bin", "v2")
        .with_object("releases/v3/app.bin", "v3")
}

#[tokio::test]
async fn test_mirror_reproduces_key_hierarchy() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path(), "releases", &["v1", "v2"]);
    cfg.verify_checksums = true;

    let summary = Mirror::new(Arc::new(release_bucket()), cfg)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.prefixes_listed, 2);
    assert_eq!(summary.keys_listed, 6);
    assert_eq!(summary.keys_unique, 4);
    assert_eq!(summary.files_written, 3);
    assert_eq!(summary.directories_created, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.bytes_written, 200_000 + 4 + 2);

    let root = dir.path();
    assert_eq!(std::fs::read(root.join("v1/app.bin")).unwrap().len(), 200_000);
    assert_eq!(std::fs::read_to_string(root.join("v1/docs/readme.md")).unwrap(), "# v1");
    assert!(root.join("v1/empty").is_dir());
    assert_eq!(std::fs::read_to_string(root.join("v2/app.bin")).unwrap(), "v2");
    assert!(!root.join("v3").exists());
    assert!(!root.join("releases").exists());
}

#[tokio::test]
async fn test_second_run_produces_identical_tree() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(release_bucket());

    Mirror::new(store.clone(), config(dir.path(), "releases", &["v1", "v2", "v3"]))
        .run()
        .await
        .unwrap();
    let first = snapshot(dir.path());

    let summary = Mirror::new(store, config(dir.path(), "releases", &["v1", "v2", "v3"]))
        .run()
        .await
        .unwrap();
    let second = snapshot(dir.path());

    assert_eq!(summary.files_written, 4);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_duplicate_selectors_are_listed_once() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(release_bucket());

    let summary = Mirror::new(
        store.clone(),
        config(dir.path(), "releases", &["v2", "v3", "v2", "v3"]),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.prefixes_listed, 2);
    assert_eq!(store.list_requests(), 2);
    assert_eq!(summary.keys_listed, 2);
    assert_eq!(store.get_requests(), 2);
}

#[tokio::test]
async fn test_overlapping_selectors_download_each_key_once() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(release_bucket());

    let summary = Mirror::new(store.clone(), config(dir.path(), "releases", &["v1", "v1/docs"]))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.keys_listed, 7);
    assert_eq!(summary.keys_unique, 3);
    assert_eq!(store.get_requests(), 2);
}

#[tokio::test]
async fn test_lone_directory_marker_becomes_empty_directory() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new("artifacts").with_object("a/", "");

    let summary = Mirror::new(Arc::new(store), config(dir.path(), "", &["a"]))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.files_written, 0);
    assert_eq!(summary.directories_created, 1);
    assert!(dir.path().join("a").is_dir());
}

#[tokio::test]
async fn test_listing_failure_aborts_before_any_download() {
    let dir = TempDir::new().unwrap();
    let mut store = FaultyStore::new(release_bucket());
    store.failing_prefixes.push("releases/v2".to_string());

    let err = Mirror::new(Arc::new(store), config(dir.path(), "releases", &["v1", "v2"]))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, MirrorError::Listing { ref prefix, .. } if prefix == "releases/v2"));
    assert!(snapshot(dir.path()).is_empty());
}

#[tokio::test]
async fn test_fetch_failure_keeps_completed_files() {
    let dir = TempDir::new().unwrap();
    let inner = MemoryStore::new("artifacts")
        .with_object("a.txt", "a")
        .with_object("b.txt", "b")
        .with_object("c.txt", "c");
    let mut store = FaultyStore::new(inner);
    store.failing_keys.push("c.txt".to_string());

    let mut cfg = config(dir.path(), "", &["a.txt", "b.txt", "c.txt"]);
    cfg.max_concurrent_downloads = 1;

    let err = Mirror::new(Arc::new(store), cfg).run().await.unwrap_err();

    assert!(matches!(err, MirrorError::Fetch { ref key, .. } if key == "c.txt"));
    assert!(err.to_string().contains("connection reset"));
    assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "a");
    assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "b");
    assert!(!dir.path().join("c.txt").exists());
}

#[tokio::test]
async fn test_vanished_object_is_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let mut store = FaultyStore::new(release_bucket());
    store.vanished_keys.push("releases/v3/app.bin".to_string());

    let summary = Mirror::new(Arc::new(store), config(dir.path(), "releases", &["v2", "v3"]))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.files_written, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.bytes_written, 2);
    assert!(!dir.path().join("v3").exists());
}

/// Streams `big.bin` slowly while `fail.bin` fails partway through.
struct SlowSiblingStore;

#[async_trait]
impl ObjectStore for SlowSiblingStore {
    async fn list_objects(
        &self,
        _: &str,
        _: &str,
        _: Option<&str>,
    ) -> Result<ListingPage, StoreError> {
        Ok(ListingPage {
            keys: vec!["big.bin".to_string(), "fail.bin".to_string()],
            next_continuation_token: None,
            is_truncated: false,
        })
    }

    async fn get_object(&self, _: &str, key: &str) -> Result<FetchedObject, StoreError> {
        if key == "fail.bin" {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Err(StoreError::new("connection reset by peer"));
        }
        let body = stream::iter(0..10).then(|_| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, std::io::Error>(Bytes::from(vec![0u8; 1000]))
        });
        Ok(FetchedObject {
            status: 200,
            content_length: Some(10_000),
            etag: None,
            body: Some(Box::pin(body)),
        })
    }
}

#[tokio::test]
async fn test_failure_leaves_no_partial_sibling_file() {
    let dir = TempDir::new().unwrap();

    let err = Mirror::new(Arc::new(SlowSiblingStore), config(dir.path(), "", &["all"]))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, MirrorError::Fetch { ref key, .. } if key == "fail.bin"));
    assert!(!dir.path().join("big.bin").exists());
    assert!(snapshot(dir.path()).is_empty());
}

#[tokio::test]
async fn test_failure_keeps_previous_copy_of_interrupted_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("big.bin"), "from the last run").unwrap();

    Mirror::new(Arc::new(SlowSiblingStore), config(dir.path(), "", &["all"]))
        .run()
        .await
        .unwrap_err();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("big.bin")).unwrap(),
        "from the last run"
    );
    assert_eq!(snapshot(dir.path()).len(), 1);
}

#[tokio::test]
async fn test_empty_selector_mirrors_siblings_of_prefix() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new("artifacts")
        .with_object("p/a.txt", "a")
        .with_object("pq/x.txt", "x");

    let summary = Mirror::new(Arc::new(store), config(dir.path(), "p", &[""]))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.files_written, 2);
    assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "a");
    assert_eq!(std::fs::read_to_string(dir.path().join("q/x.txt")).unwrap(), "x");
}

#[tokio::test]
async fn test_traversal_key_never_writes_outside_working_dir() {
    let outer = TempDir::new().unwrap();
    let working = outer.path().join("mirror");
    let store = MemoryStore::new("artifacts")
        .with_object("../../etc/passwd", "root:x:0:0")
        .with_object("../safe.txt", "ok");

    let err = Mirror::new(Arc::new(store), config(&working, "", &["../"]))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, MirrorError::PathSafety { .. }));
    assert!(!outer.path().join("etc").exists());
    assert!(!outer.path().join("safe.txt").exists());
    assert!(snapshot(&working).is_empty());
}

#[tokio::test]
async fn test_unknown_bucket_is_a_listing_error() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path(), "", &["x"]);
    cfg.bucket = "missing".to_string();

    let err = Mirror::new(Arc::new(release_bucket()), cfg)
        .run()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("NoSuchBucket"));
}
