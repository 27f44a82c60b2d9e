//! Retry and backoff policy.
//!
//! Errors from a single day attempt (fetch, split, publish) are classified into
//! an [`ErrorKind`] and the [`RetryPolicy`] turns the kind plus the attempt
//! count into either a backoff delay or a terminal failure. The scheduler owns
//! the actual waiting; nothing here sleeps.

mod classify;
mod error;
mod policy;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::{AttemptError, DayError};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
