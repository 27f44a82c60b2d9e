//! Atomic publish: write a hidden temp file in the target directory, fsync, rename.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{StorageError, TEMP_SUFFIX};

/// Write `data` to `dir/file_name` so that readers only ever see the complete file.
/// The temp file lives in the same directory, so the final rename never crosses
/// filesystems. On any error the temp file is removed when dropped.
pub(super) fn publish_atomic(dir: &Path, file_name: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
    fs::create_dir_all(dir).map_err(|e| StorageError::classify(dir.to_path_buf(), e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| StorageError::classify(dir.to_path_buf(), e))?;

    let final_path = dir.join(file_name);
    let io_err = |source| StorageError::Io {
        path: final_path.clone(),
        source,
    };
    tmp.write_all(data).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(&final_path).map_err(|e| io_err(e.error))?;
    Ok(final_path)
}

/// True for leftovers of an interrupted [`publish_atomic`].
pub(super) fn is_stale_temp(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}
