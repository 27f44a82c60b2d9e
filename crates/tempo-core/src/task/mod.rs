//! Day Task state machine.
//!
//! A day task moves forward only:
//!
//! ```text
//! Pending ──claim──▶ Fetching ──fetched──▶ Splitting ──complete──▶ Done
//!    ▲                  │                      │
//!    └──── retry ───────┴──── fail ────────────┴──────────────▶ Failed
//!    └──── revert (cancel / crash recovery) ◀──┘
//! Pending ──satisfy_from_cache──▶ Done
//! ```
//!
//! `attempts` counts failed attempts only; reverts never consume one.

use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::JobId;
use crate::retry::{DayError, RetryDecision, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayStatus {
    Pending,
    Fetching,
    Splitting,
    Done,
    Failed,
}

impl DayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DayStatus::Pending => "pending",
            DayStatus::Fetching => "fetching",
            DayStatus::Splitting => "splitting",
            DayStatus::Done => "done",
            DayStatus::Failed => "failed",
        }
    }

    /// Unknown values read back from the ledger are treated as `Pending` so the
    /// day is re-checked against the cache rather than silently dropped.
    pub fn from_ledger(s: &str) -> Self {
        match s {
            "fetching" => DayStatus::Fetching,
            "splitting" => DayStatus::Splitting,
            "done" => DayStatus::Done,
            "failed" => DayStatus::Failed,
            _ => DayStatus::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DayStatus::Done | DayStatus::Failed)
    }

    /// Claimed by a worker. After a crash these are stale.
    pub fn is_in_flight(self) -> bool {
        matches!(self, DayStatus::Fetching | DayStatus::Splitting)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal transition {from:?} -> {to:?} for day {date}")]
pub struct TransitionError {
    pub date: NaiveDate,
    pub from: DayStatus,
    pub to: DayStatus,
}

/// Result of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Back to `Pending`; eligible again after `delay`.
    Requeued { delay: Duration },
    /// Attempts exhausted or error not retryable.
    Terminal,
}

/// Unit of work: one calendar day of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct DayTask {
    job_id: JobId,
    date: NaiveDate,
    status: DayStatus,
    attempts: u32,
    last_error: Option<String>,
    artifacts: Vec<String>,
    /// Unix millis before which a requeued task must not be claimed.
    not_before: Option<i64>,
}

impl DayTask {
    pub fn new(job_id: JobId, date: NaiveDate) -> Self {
        Self {
            job_id,
            date,
            status: DayStatus::Pending,
            attempts: 0,
            last_error: None,
            artifacts: Vec::new(),
            not_before: None,
        }
    }

    /// Rebuild a task from persisted columns.
    pub fn restore(
        job_id: JobId,
        date: NaiveDate,
        status: DayStatus,
        attempts: u32,
        last_error: Option<String>,
        artifacts: Vec<String>,
        not_before: Option<i64>,
    ) -> Self {
        Self {
            job_id,
            date,
            status,
            attempts,
            last_error,
            artifacts,
            not_before,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn status(&self) -> DayStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Cache-relative artifact paths, set once the task is `Done`.
    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    pub fn not_before(&self) -> Option<i64> {
        self.not_before
    }

    fn illegal(&self, to: DayStatus) -> TransitionError {
        TransitionError {
            date: self.date,
            from: self.status,
            to,
        }
    }

    /// Pending → Fetching.
    pub fn claim(&mut self) -> Result<(), TransitionError> {
        if self.status != DayStatus::Pending {
            return Err(self.illegal(DayStatus::Fetching));
        }
        self.status = DayStatus::Fetching;
        self.not_before = None;
        Ok(())
    }

    /// Fetching → Splitting.
    pub fn fetched(&mut self) -> Result<(), TransitionError> {
        if self.status != DayStatus::Fetching {
            return Err(self.illegal(DayStatus::Splitting));
        }
        self.status = DayStatus::Splitting;
        Ok(())
    }

    /// Splitting → Done, recording the published artifacts.
    pub fn complete(&mut self, artifacts: Vec<String>) -> Result<(), TransitionError> {
        if self.status != DayStatus::Splitting {
            return Err(self.illegal(DayStatus::Done));
        }
        self.status = DayStatus::Done;
        self.artifacts = artifacts;
        self.last_error = None;
        Ok(())
    }

    /// Pending → Done when every expected artifact is already cached.
    pub fn satisfy_from_cache(&mut self, artifacts: Vec<String>) -> Result<(), TransitionError> {
        if self.status != DayStatus::Pending {
            return Err(self.illegal(DayStatus::Done));
        }
        self.status = DayStatus::Done;
        self.artifacts = artifacts;
        self.not_before = None;
        self.last_error = None;
        Ok(())
    }

    /// Record a failed attempt from Fetching or Splitting. `now_ms` is unix millis.
    pub fn fail(
        &mut self,
        error: &DayError,
        policy: &RetryPolicy,
        now_ms: i64,
    ) -> Result<FailOutcome, TransitionError> {
        if !self.status.is_in_flight() {
            return Err(self.illegal(DayStatus::Failed));
        }
        self.attempts += 1;
        self.last_error = Some(error.to_string());
        match policy.decide(self.attempts, error.kind()) {
            RetryDecision::RetryAfter(delay) => {
                self.status = DayStatus::Pending;
                self.not_before = Some(now_ms.saturating_add(delay.as_millis() as i64));
                Ok(FailOutcome::Requeued { delay })
            }
            RetryDecision::NoRetry => {
                self.status = DayStatus::Failed;
                self.not_before = None;
                Ok(FailOutcome::Terminal)
            }
        }
    }

    /// Fetching/Splitting → Pending without consuming an attempt. Returns whether
    /// anything changed; other states are left alone.
    pub fn revert(&mut self) -> bool {
        if !self.status.is_in_flight() {
            return false;
        }
        self.status = DayStatus::Pending;
        self.not_before = None;
        true
    }
}
