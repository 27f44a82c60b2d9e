use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SplitError {
    /// Payload could not be parsed or is internally inconsistent.
    #[error("malformed payload: {0}")]
    Malformed(String),
    /// Payload parsed but lacks some requested hours.
    #[error("payload for {date} is missing hours {missing:?}")]
    PartialCoverage { date: NaiveDate, missing: Vec<u8> },
}
