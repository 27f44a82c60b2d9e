//! Upstream fetch seam.
//!
//! A [`ClientFactory`] opens one [`FetchClient`] session per claimed day. The
//! session is handed an isolated scratch directory and a cancellation token and
//! is dropped when the attempt ends, so nothing (auth state, temp files,
//! connection pools) leaks between concurrent workers.

mod http;

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use http::{HttpClientFactory, HttpFetchClient};

use crate::model::{AuthMode, JobId, ProductSelection, Region};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transfer failed: {0}")]
    Curl(#[from] curl::Error),
    #[error("HTTP {0}")]
    Http(u32),
    /// Transport failure reported by a non-curl client.
    #[error("connection failed: {0}")]
    Connection(String),
    /// Upstream refused the request outright (bad credentials, bad parameters).
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("fetch cancelled")]
    Cancelled,
    #[error("scratch file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parameters for one day's fetch.
#[derive(Debug, Clone)]
pub struct DayRequest {
    pub job_id: JobId,
    pub date: NaiveDate,
    pub hours: Vec<u8>,
    pub region: Region,
    pub selection: ProductSelection,
    pub auth: AuthMode,
}

/// Per-attempt context a session is opened with.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// 1-based worker index, for logs and scratch naming.
    pub worker: usize,
    /// Scratch directory owned by this attempt; removed when the attempt ends.
    pub workdir: PathBuf,
    /// Cancelled on job cancellation or when the attempt deadline passes.
    pub cancel: CancellationToken,
}

/// One isolated upstream session. Blocking; the scheduler runs it on the
/// blocking pool.
pub trait FetchClient: Send {
    /// Return the raw daily payload for `request`.
    fn fetch_day(&mut self, request: &DayRequest) -> Result<Vec<u8>, FetchError>;
}

/// Creates fresh sessions. Shared by all workers of a run.
pub trait ClientFactory: Send + Sync {
    fn open_session(&self, ctx: &SessionContext) -> Result<Box<dyn FetchClient>, FetchError>;
}
