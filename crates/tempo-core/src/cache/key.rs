//! Deterministic artifact naming.

use std::fmt;

use chrono::NaiveDate;

use crate::model::{JobRequest, ProductSelection, Region};

/// Directory namespace shared by every job with the same area, products and filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactNamespace {
    label: String,
    fingerprint: String,
}

impl ArtifactNamespace {
    pub fn new(selection: &ProductSelection, region: &Region) -> Self {
        Self {
            label: selection.label(),
            fingerprint: selection.fingerprint(region),
        }
    }

    pub fn for_job(request: &JobRequest) -> Self {
        Self::new(&request.selection, &request.region)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn key(&self, date: NaiveDate, hour: u8) -> ArtifactKey {
        ArtifactKey {
            namespace: self.clone(),
            date,
            hour,
        }
    }
}

/// Identity of one hour artifact: `{label}_{YYYY-MM-DD}_{HH}.nc` under the fingerprint directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    namespace: ArtifactNamespace,
    date: NaiveDate,
    hour: u8,
}

impl ArtifactKey {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn namespace(&self) -> &ArtifactNamespace {
        &self.namespace
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{:02}.nc",
            self.namespace.label,
            self.date.format("%Y-%m-%d"),
            self.hour
        )
    }

    /// Path relative to the cache root; this is what the ledger records.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.namespace.fingerprint, self.file_name())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative_path())
    }
}
