//! Mapping of remote keys onto contained local paths.

use crate::error::MirrorError;
use std::path::{Component, Path, PathBuf};

/// Maps remote keys into a working directory.
#[derive(Debug, Clone)]
pub struct PathMapper {
    working_dir: PathBuf,
    prefix: String,
}

impl PathMapper {
    /// Creates a mapper for keys listed under `prefix`.
    ///
    /// `working_dir` should be absolute; relative directories are accepted
    /// but containment is then checked against the relative form.
    pub fn new(working_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Returns the local path for `key`.
    ///
    /// The shared prefix is stripped character for character, along with the
    /// separators that follow it, then the remainder is normalized lexically.
    /// A listing of `p` also returns siblings such as `pq/x.txt`; those map to
    /// `q/x.txt`.
    ///
    /// # Errors
    ///
    /// [`MirrorError::PathSafety`] for absolute keys, keys whose `..`
    /// segments climb out of the working directory, content keys that map
    /// onto the working directory itself, and keys that do not start with
    /// the shared prefix at all.
    ///
    /// # Example
    ///
    /// ```
    /// use s3mirror::PathMapper;
    /// use std::path::Path;
    ///
    /// let mapper = PathMapper::new("/srv/mirror", "releases");
    /// let path = mapper.map("releases/v1/app.bin").unwrap();
    /// assert_eq!(path, Path::new("/srv/mirror/v1/app.bin"));
    /// assert!(mapper.map("releases/../../etc/passwd").is_err());
    /// ```
    pub fn map(&self, key: &str) -> Result<PathBuf, MirrorError> {
        let relative = self.strip_prefix(key)?;
        let normalized = normalize(key, relative)?;
        if normalized.as_os_str().is_empty() && !key.ends_with('/') {
            return Err(MirrorError::path_safety(
                key,
                "maps onto the working directory itself",
            ));
        }

        let path = self.working_dir.join(normalized);
        if !path.starts_with(&self.working_dir) {
            return Err(MirrorError::path_safety(
                key,
                format!("resolves outside {}", self.working_dir.display()),
            ));
        }
        Ok(path)
    }

    fn strip_prefix<'k>(&self, key: &'k str) -> Result<&'k str, MirrorError> {
        if self.prefix.is_empty() {
            return Ok(key);
        }
        let rest = key.strip_prefix(self.prefix.as_str()).ok_or_else(|| {
            MirrorError::path_safety(key, format!("not under prefix '{}'", self.prefix))
        })?;
        Ok(rest.trim_start_matches('/'))
    }
}

/// Resolves `.` and `..` without touching the filesystem.
fn normalize(key: &str, relative: &str) -> Result<PathBuf, MirrorError> {
    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(MirrorError::path_safety(
                        key,
                        "escapes the working directory",
                    ));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(MirrorError::path_safety(key, "absolute path"));
            }
        }
    }
    Ok(normalized)
}
