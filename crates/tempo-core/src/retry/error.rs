//! Error types for a single day attempt.

use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

use super::{classify, ErrorKind};
use crate::cache::StorageError;
use crate::fetch::FetchError;
use crate::model::JobId;
use crate::splitter::SplitError;

/// What went wrong during one fetch → split → publish attempt.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The per-attempt deadline elapsed before the fetch returned.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AttemptError {
    /// An unwritable data directory fails the whole job; no day can succeed.
    pub fn is_job_fatal(&self) -> bool {
        matches!(self, AttemptError::Storage(e) if e.is_data_dir_unwritable())
    }
}

/// Attempt error tagged with the job, day and attempt number it belongs to.
#[derive(Debug, Error)]
#[error("job {job_id} day {date} attempt {attempt}: {source}")]
pub struct DayError {
    pub job_id: JobId,
    pub date: NaiveDate,
    pub attempt: u32,
    #[source]
    pub source: AttemptError,
}

impl DayError {
    pub fn kind(&self) -> ErrorKind {
        classify(&self.source)
    }
}
