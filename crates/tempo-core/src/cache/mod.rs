//! Hour artifact cache.
//!
//! Artifacts live at `{root}/{fingerprint}/{label}_{YYYY-MM-DD}_{HH}.nc`. An
//! artifact is either absent or complete: writes go through a hidden `.part`
//! temp file in the same directory and are renamed into place.

mod error;
mod key;
mod publish;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

pub use error::StorageError;
pub use key::{ArtifactKey, ArtifactNamespace};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Handle on the cache root. Cheap to clone; all state is on disk.
#[derive(Debug, Clone)]
pub struct HourCache {
    root: PathBuf,
}

impl HourCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, key: &ArtifactKey) -> PathBuf {
        self.root
            .join(key.namespace().fingerprint())
            .join(key.file_name())
    }

    /// Create the root if needed and prove a file can be written there.
    pub fn ensure_writable(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(|source| StorageError::DataDirUnwritable {
            path: self.root.clone(),
            source,
        })?;
        tempfile::Builder::new()
            .prefix(".probe")
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.root)
            .map_err(|source| StorageError::DataDirUnwritable {
                path: self.root.clone(),
                source,
            })?;
        Ok(())
    }

    /// A complete artifact is present. Never creates or modifies anything.
    pub fn exists(&self, key: &ArtifactKey) -> bool {
        fs::metadata(self.path(key))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Publish atomically; returns the cache-relative path recorded in the ledger.
    pub fn publish(&self, key: &ArtifactKey, data: &[u8]) -> Result<String, StorageError> {
        let dir = self.root.join(key.namespace().fingerprint());
        let path = publish::publish_atomic(&dir, &key.file_name(), data)?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "published artifact");
        Ok(key.relative_path())
    }

    /// Hours of `date` whose artifact is not present.
    pub fn missing_hours(&self, ns: &ArtifactNamespace, date: NaiveDate, hours: &[u8]) -> Vec<u8> {
        hours
            .iter()
            .copied()
            .filter(|&h| !self.exists(&ns.key(date, h)))
            .collect()
    }

    /// Relative paths for every hour of `date` if all are present, else `None`.
    pub fn day_artifacts(
        &self,
        ns: &ArtifactNamespace,
        date: NaiveDate,
        hours: &[u8],
    ) -> Option<Vec<String>> {
        hours
            .iter()
            .map(|&h| {
                let key = ns.key(date, h);
                self.exists(&key).then(|| key.relative_path())
            })
            .collect()
    }

    /// Remove `.part` leftovers from interrupted publishes. Only call while no
    /// job is running against this root.
    pub fn sweep_stale_temps(&self) -> Result<usize, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::classify(self.root.clone(), e)),
        };
        let mut removed = 0;
        for dir in entries.flatten() {
            if !dir.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let Ok(files) = fs::read_dir(dir.path()) else {
                continue;
            };
            for f in files.flatten() {
                let name = f.file_name();
                if publish::is_stale_temp(&name.to_string_lossy()) {
                    let path = f.path();
                    fs::remove_file(&path).map_err(|e| StorageError::classify(path.clone(), e))?;
                    tracing::debug!(path = %path.display(), "removed stale temp file");
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
