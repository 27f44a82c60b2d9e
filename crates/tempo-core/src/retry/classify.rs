//! Classify HTTP status, curl errors and attempt errors into retry kinds.

use super::error::AttemptError;
use super::policy::ErrorKind;
use crate::fetch::FetchError;
use crate::splitter::SplitError;

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

fn classify_fetch(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Curl(ce) => classify_curl_error(ce),
        FetchError::Http(code) => classify_http_status(*code),
        FetchError::Connection(_) => ErrorKind::Connection,
        FetchError::Io(_) => ErrorKind::Storage,
        FetchError::Rejected(_) | FetchError::Cancelled => ErrorKind::Other,
    }
}

/// Classify an attempt error into an ErrorKind.
pub fn classify(e: &AttemptError) -> ErrorKind {
    match e {
        AttemptError::Fetch(fe) => classify_fetch(fe),
        AttemptError::Timeout(_) => ErrorKind::Timeout,
        AttemptError::Split(SplitError::Malformed(_) | SplitError::PartialCoverage { .. }) => {
            ErrorKind::Payload
        }
        AttemptError::Storage(_) => ErrorKind::Storage,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn http_429_and_503_throttled() {
        assert_eq!(classify_http_status(429), ErrorKind::Throttled);
        assert_eq!(classify_http_status(503), ErrorKind::Throttled);
    }

    #[test]
    fn http_5xx_retryable() {
        assert!(matches!(classify_http_status(500), ErrorKind::Http5xx(500)));
        assert!(matches!(classify_http_status(502), ErrorKind::Http5xx(502)));
    }

    #[test]
    fn http_4xx_other() {
        assert_eq!(classify_http_status(404), ErrorKind::Other);
        assert_eq!(classify_http_status(403), ErrorKind::Other);
    }

    #[test]
    fn attempt_errors() {
        assert_eq!(
            classify(&AttemptError::Timeout(Duration::from_secs(180))),
            ErrorKind::Timeout
        );
        assert_eq!(
            classify(&AttemptError::Split(SplitError::PartialCoverage {
                date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
                missing: vec![22, 23],
            })),
            ErrorKind::Payload
        );
        assert_eq!(
            classify(&AttemptError::Fetch(FetchError::Connection("reset".into()))),
            ErrorKind::Connection
        );
        assert_eq!(
            classify(&AttemptError::Fetch(FetchError::Rejected("bad key".into()))),
            ErrorKind::Other
        );
    }
}
