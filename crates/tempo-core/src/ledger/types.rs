//! Types returned by the ledger.

use chrono::NaiveDate;

use crate::model::{JobId, JobRequest, JobStatus};

/// Full job record used by the scheduler.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    pub request: JobRequest,
    pub created_at: i64,
    pub updated_at: i64,
    /// Set when the last run aborted on a job-level fatal condition.
    pub fatal_error: Option<String>,
}

/// Summary view used by the CLI `status` command.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub id: JobId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    /// Days currently recorded as Fetching or Splitting.
    pub in_flight: usize,
    pub status: JobStatus,
    pub fatal_error: Option<String>,
    pub created_at: i64,
}

impl JobSummary {
    pub fn pending(&self) -> usize {
        self.total - self.done - self.failed - self.in_flight
    }
}
