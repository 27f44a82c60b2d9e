//! Batch import: one job request per CSV row.
//!
//! Headers are matched case-insensitively against a list of aliases. A row
//! references its region either by preset name (`region`) or by a centre
//! point (`latitude`/`longitude`, optional `radius_km`). Bad rows are
//! collected as [`RowError`]s and never stop the remaining rows; only a
//! missing column or an unreadable file fails the whole import.

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use thiserror::Error;

use crate::config::TempoConfig;
use crate::model::{hour_range, JobRequest, Product, ProductSelection, Region, Weekdays};


const DEFAULT_RADIUS_KM: f64 = 10.0;
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

const NAME: &[&str] = &["name", "site_name", "site", "location", "id", "site_id"];
const REGION: &[&str] = &["region", "preset"];
const LATITUDE: &[&str] = &["latitude", "lat", "y", "lat_dd"];
const LONGITUDE: &[&str] = &["longitude", "lon", "long", "x", "lng", "lon_dd"];
const RADIUS: &[&str] = &["radius_km", "radius", "radius (km)"];
const DATE_START: &[&str] = &["date_start", "start_date"];
const DATE_END: &[&str] = &["date_end", "end_date"];
const HOUR_START: &[&str] = &["hour_start", "time_start", "start_hour"];
const HOUR_END: &[&str] = &["hour_end", "time_end", "end_hour"];
const MAX_CLOUD: &[&str] = &["max_cloud", "cloud_fraction", "cloud"];
const MAX_SZA: &[&str] = &["max_sza", "sza", "solar_zenith"];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("missing required column {0}")]
    MissingColumn(&'static str),
    #[error("file has no data rows")]
    Empty,
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// A row that could not be turned into a job. `row` is the 1-based line in the file.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("row {row}: {reason}")]
pub struct RowError {
    pub row: u64,
    pub reason: String,
}

/// Accepted requests (with their row numbers), rejected rows, and non-fatal notes.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub jobs: Vec<(u64, JobRequest)>,
    pub rejected: Vec<RowError>,
    pub warnings: Vec<String>,
}

struct Columns {
    name: Option<usize>,
    region: Option<usize>,
    latitude: Option<usize>,
    longitude: Option<usize>,
    radius: Option<usize>,
    date_start: usize,
    date_end: usize,
    hour_start: Option<usize>,
    hour_end: Option<usize>,
    max_cloud: Option<usize>,
    max_sza: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, ImportError> {
        let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        let find = |aliases: &[&str]| {
            aliases
                .iter()
                .find_map(|a| normalized.iter().position(|h| h == a))
        };

        let date_start = find(DATE_START).ok_or(ImportError::MissingColumn("date_start"))?;
        let date_end = find(DATE_END).ok_or(ImportError::MissingColumn("date_end"))?;
        let region = find(REGION);
        let latitude = find(LATITUDE);
        let longitude = find(LONGITUDE);
        if region.is_none() && (latitude.is_none() || longitude.is_none()) {
            return Err(ImportError::MissingColumn("region (or latitude and longitude)"));
        }

        Ok(Self {
            name: find(NAME),
            region,
            latitude,
            longitude,
            radius: find(RADIUS),
            date_start,
            date_end,
            hour_start: find(HOUR_START),
            hour_end: find(HOUR_END),
            max_cloud: find(MAX_CLOUD),
            max_sza: find(MAX_SZA),
        })
    }
}

fn field(record: &StringRecord, col: Option<usize>) -> Option<&str> {
    col.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Optional numeric override; unparsable values fall back to the default with a warning.
fn optional<T: std::str::FromStr>(
    record: &StringRecord,
    col: Option<usize>,
    what: &str,
    row: u64,
    warnings: &mut Vec<String>,
) -> Option<T> {
    let raw = field(record, col)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warnings.push(format!("row {row}: invalid {what} {raw:?}, using default"));
            None
        }
    }
}

fn parse_row(
    record: &StringRecord,
    cols: &Columns,
    row: u64,
    cfg: &TempoConfig,
    products: &[Product],
    warnings: &mut Vec<String>,
) -> Result<JobRequest, String> {
    let region = match field(record, cols.region) {
        Some(preset) => cfg.region(preset).map_err(|e| e.to_string())?,
        None => {
            let lat = field(record, cols.latitude).ok_or("missing latitude")?;
            let lon = field(record, cols.longitude).ok_or("missing longitude")?;
            let lat: f64 = lat.parse().map_err(|_| format!("invalid latitude {lat:?}"))?;
            let lon: f64 = lon.parse().map_err(|_| format!("invalid longitude {lon:?}"))?;
            let radius = optional(record, cols.radius, "radius_km", row, warnings)
                .unwrap_or(DEFAULT_RADIUS_KM);
            Region::from_center(lat, lon, radius).map_err(|e| e.to_string())?
        }
    };

    let start = field(record, Some(cols.date_start)).ok_or("missing start date")?;
    let end = field(record, Some(cols.date_end)).ok_or("missing end date")?;
    let start_date = parse_date(start).ok_or_else(|| format!("invalid start date {start:?}"))?;
    let end_date = parse_date(end).ok_or_else(|| format!("invalid end date {end:?}"))?;

    let mut hour_start = cfg.hour_start;
    let mut hour_end = cfg.hour_end;
    for (slot, col, what) in [
        (&mut hour_start, cols.hour_start, "hour_start"),
        (&mut hour_end, cols.hour_end, "hour_end"),
    ] {
        match optional::<u8>(record, col, what, row, warnings) {
            Some(h) if h <= 23 => *slot = h,
            Some(h) => warnings.push(format!("row {row}: {what} {h} is outside 0..=23, using default")),
            None => {}
        }
    }
    if hour_start > hour_end {
        return Err(format!("hour window {hour_start}..={hour_end} is inverted"));
    }

    let mut filters = cfg.filters;
    // Cloud is given as a fraction (0..=1) in import files.
    if let Some(cloud) = optional::<f64>(record, cols.max_cloud, "max_cloud", row, warnings) {
        filters.max_cloud_pct = cloud * 100.0;
    }
    if let Some(sza) = optional::<f64>(record, cols.max_sza, "max_sza", row, warnings) {
        filters.max_sza_deg = sza;
    }
    let selection =
        ProductSelection::new(products.iter().copied(), filters).map_err(|e| e.to_string())?;

    let name = match field(record, cols.name) {
        Some(n) => n.to_string(),
        None => format!(
            "{} {start_date}..{end_date}",
            region.label().unwrap_or("site")
        ),
    };

    let request = JobRequest {
        name,
        region,
        selection,
        start_date,
        end_date,
        hours: hour_range(hour_start, hour_end),
        weekdays: Weekdays::ALL,
        workers: cfg.effective_workers(),
        auth: cfg.auth.clone(),
    }
    .normalized();
    request.validate().map_err(|e| e.to_string())?;
    Ok(request)
}

/// Parse CSV from any reader. Presets and defaults come from `cfg`.
pub fn parse_import_reader<R: io::Read>(
    reader: R,
    cfg: &TempoConfig,
    products: &[Product],
) -> Result<ImportReport, ImportError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let cols = Columns::locate(rdr.headers()?)?;

    let mut report = ImportReport::default();
    let mut seen = 0usize;
    for (idx, result) in rdr.records().enumerate() {
        seen += 1;
        let fallback_row = idx as u64 + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                let row = e.position().map(|p| p.line()).unwrap_or(fallback_row);
                report.rejected.push(RowError {
                    row,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let row = record.position().map(|p| p.line()).unwrap_or(fallback_row);
        match parse_row(&record, &cols, row, cfg, products, &mut report.warnings) {
            Ok(req) => report.jobs.push((row, req)),
            Err(reason) => {
                tracing::warn!(row, %reason, "import row rejected");
                report.rejected.push(RowError { row, reason });
            }
        }
    }
    if seen == 0 {
        return Err(ImportError::Empty);
    }
    Ok(report)
}

pub fn parse_import_file(
    path: &Path,
    cfg: &TempoConfig,
    products: &[Product],
) -> Result<ImportReport> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let report = parse_import_reader(file, cfg, products)
        .with_context(|| format!("failed to import {}", path.display()))?;
    tracing::info!(
        file = %path.display(),
        accepted = report.jobs.len(),
        rejected = report.rejected.len(),
        "parsed import file"
    );
    Ok(report)
}
