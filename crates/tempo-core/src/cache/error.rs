use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The cache root cannot be created or written at all.
    #[error("data directory {} is not writable: {source}", path.display())]
    DataDirUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub fn is_data_dir_unwritable(&self) -> bool {
        matches!(self, StorageError::DataDirUnwritable { .. })
    }

    /// Permission failures mean the whole directory is off limits; anything else
    /// (disk full, transient I/O) is scoped to the one write.
    pub(super) fn classify(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            StorageError::DataDirUnwritable { path, source }
        } else {
            StorageError::Io { path, source }
        }
    }
}
