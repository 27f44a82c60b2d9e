//! Job request parameters and derived job status.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ProductSelection, Region, SelectionError};
use crate::task::DayStatus;

pub type JobId = i64;

/// Upper bound on concurrent workers per job.
pub const MAX_WORKERS: usize = 8;

/// Clamp a requested worker count into `1..=MAX_WORKERS`.
pub fn clamp_workers(requested: usize) -> usize {
    requested.clamp(1, MAX_WORKERS)
}

/// Inclusive hour range `start..=end`, e.g. 14..=23 for the daylight UTC window.
pub fn hour_range(start: u8, end: u8) -> Vec<u8> {
    (start..=end).collect()
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobRequestError {
    #[error("job name must not be empty")]
    EmptyName,
    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("hour window is empty")]
    EmptyHours,
    #[error("hour {0} is outside 0..=23")]
    HourOutOfRange(u8),
    #[error("no day between {start} and {end} matches the weekday filter")]
    NoDays { start: NaiveDate, end: NaiveDate },
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Credentials presented to the upstream service.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Anonymous,
    Key(String),
}

impl AuthMode {
    /// Token sent as a bearer credential; anonymous access uses the literal `anonymous`.
    pub fn token(&self) -> &str {
        match self {
            AuthMode::Anonymous => "anonymous",
            AuthMode::Key(k) => k,
        }
    }
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Anonymous => f.write_str("Anonymous"),
            AuthMode::Key(_) => f.write_str("Key(***)"),
        }
    }
}

/// Bit set of weekdays (Monday = bit 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weekdays(u8);

impl Weekdays {
    pub const ALL: Weekdays = Weekdays(0b111_1111);

    pub fn from_days(days: impl IntoIterator<Item = Weekday>) -> Self {
        Weekdays(
            days.into_iter()
                .fold(0, |bits, d| bits | (1 << d.num_days_from_monday())),
        )
    }

    pub fn from_bits(bits: u8) -> Self {
        Weekdays(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }
}

impl Default for Weekdays {
    fn default() -> Self {
        Self::ALL
    }
}

impl FromStr for Weekdays {
    type Err = String;

    /// Accepts `all`, `weekdays`, `weekends`, or a comma list such as `mon,wed,fri`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => return Ok(Self::ALL),
            "weekdays" => return Ok(Weekdays(0b001_1111)),
            "weekends" => return Ok(Weekdays(0b110_0000)),
            _ => {}
        }
        let days = s
            .split(',')
            .map(|d| d.trim().parse::<Weekday>().map_err(|_| format!("unknown weekday {d:?}")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_days(days))
    }
}

/// Everything needed to create a job. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub name: String,
    pub region: Region,
    pub selection: ProductSelection,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Sorted, de-duplicated UTC hours fetched for every day.
    pub hours: Vec<u8>,
    #[serde(default)]
    pub weekdays: Weekdays,
    pub workers: usize,
    #[serde(default)]
    pub auth: AuthMode,
}

impl JobRequest {
    pub fn validate(&self) -> Result<(), JobRequestError> {
        if self.name.trim().is_empty() {
            return Err(JobRequestError::EmptyName);
        }
        if self.start_date > self.end_date {
            return Err(JobRequestError::InvertedRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.hours.is_empty() {
            return Err(JobRequestError::EmptyHours);
        }
        if let Some(&h) = self.hours.iter().find(|&&h| h > 23) {
            return Err(JobRequestError::HourOutOfRange(h));
        }
        self.selection.filters().validate()?;
        if self.days().is_empty() {
            return Err(JobRequestError::NoDays {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }

    /// Normalise hours (sort + dedup) and clamp workers. Call before validate/persist.
    pub fn normalized(mut self) -> Self {
        self.hours.sort_unstable();
        self.hours.dedup();
        self.workers = clamp_workers(self.workers);
        self
    }

    /// Cache namespace digest for this job's area and selection.
    pub fn fingerprint(&self) -> String {
        self.selection.fingerprint(&self.region)
    }

    /// Calendar days in `[start_date, end_date]` that pass the weekday filter.
    pub fn days(&self) -> Vec<NaiveDate> {
        self.start_date
            .iter_days()
            .take_while(|d| *d <= self.end_date)
            .filter(|d| self.weekdays.contains(d.weekday()))
            .collect()
    }
}

/// Job status, always derived from the statuses of its day tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    InProgress,
    PartiallyCompleted,
    Completed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::InProgress => "in_progress",
            JobStatus::PartiallyCompleted => "partially_completed",
            JobStatus::Completed => "completed",
        }
    }

    pub fn from_counts(total: usize, done: usize, failed: usize) -> Self {
        if done == total {
            JobStatus::Completed
        } else if failed > 0 && done + failed == total {
            JobStatus::PartiallyCompleted
        } else {
            JobStatus::InProgress
        }
    }

    pub fn derive(statuses: impl IntoIterator<Item = DayStatus>) -> Self {
        let (mut total, mut done, mut failed) = (0, 0, 0);
        for s in statuses {
            total += 1;
            match s {
                DayStatus::Done => done += 1,
                DayStatus::Failed => failed += 1,
                _ => {}
            }
        }
        Self::from_counts(total, done, failed)
    }

    pub fn is_finished(self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Product, QualityFilters};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn request(start: &str, end: &str) -> JobRequest {
        JobRequest {
            name: "la".into(),
            region: Region::from_bbox([-119.68, 32.23, -116.38, 35.73]).unwrap(),
            selection: ProductSelection::new([Product::No2], QualityFilters::default()).unwrap(),
            start_date: date(start),
            end_date: date(end),
            hours: vec![23, 14, 14, 15],
            weekdays: Weekdays::ALL,
            workers: 20,
            auth: AuthMode::Anonymous,
        }
        .normalized()
    }

    #[test]
    fn normalized_sorts_hours_and_clamps_workers() {
        let r = request("2024-06-14", "2024-06-15");
        assert_eq!(r.hours, vec![14, 15, 23]);
        assert_eq!(r.workers, MAX_WORKERS);
        assert_eq!(clamp_workers(0), 1);
    }

    #[test]
    fn days_inclusive_range() {
        let r = request("2024-06-14", "2024-06-15");
        assert_eq!(r.days(), vec![date("2024-06-14"), date("2024-06-15")]);
        r.validate().unwrap();
    }

    #[test]
    fn inverted_range_rejected() {
        let r = request("2024-06-15", "2024-06-14");
        assert!(matches!(
            r.validate(),
            Err(JobRequestError::InvertedRange { .. })
        ));
    }

    #[test]
    fn weekday_filter_applies() {
        // 2024-06-14 is a Friday, 15th Saturday, 16th Sunday, 17th Monday.
        let mut r = request("2024-06-14", "2024-06-17");
        r.weekdays = "weekends".parse().unwrap();
        assert_eq!(r.days(), vec![date("2024-06-15"), date("2024-06-16")]);
        r.weekdays = "mon,fri".parse().unwrap();
        assert_eq!(r.days(), vec![date("2024-06-14"), date("2024-06-17")]);

        let mut only_tue = request("2024-06-14", "2024-06-17");
        only_tue.weekdays = Weekdays::from_days([Weekday::Tue]);
        assert!(matches!(
            only_tue.validate(),
            Err(JobRequestError::NoDays { .. })
        ));
    }

    #[test]
    fn bad_hours_rejected() {
        let mut r = request("2024-06-14", "2024-06-14");
        r.hours = vec![];
        assert_eq!(r.validate(), Err(JobRequestError::EmptyHours));
        r.hours = vec![12, 24];
        assert_eq!(r.validate(), Err(JobRequestError::HourOutOfRange(24)));
    }

    #[test]
    fn status_derivation() {
        use DayStatus::*;
        assert_eq!(JobStatus::derive([Done, Done]), JobStatus::Completed);
        assert_eq!(
            JobStatus::derive([Done, Failed]),
            JobStatus::PartiallyCompleted
        );
        assert_eq!(JobStatus::derive([Done, Pending]), JobStatus::InProgress);
        assert_eq!(
            JobStatus::derive([Failed, Fetching]),
            JobStatus::InProgress
        );
    }

    #[test]
    fn auth_debug_hides_key() {
        let a = AuthMode::Key("secret".into());
        assert_eq!(format!("{a:?}"), "Key(***)");
        assert_eq!(a.token(), "secret");
        assert_eq!(AuthMode::Anonymous.token(), "anonymous");
    }
}
