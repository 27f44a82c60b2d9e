//! Split a raw daily payload into filtered per-hour artifacts.
//!
//! Pure: bytes in, serialized hour documents out. Publishing is the cache's job.

mod error;
mod payload;

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

pub use error::SplitError;
pub use payload::{DailyPayload, HourArtifact, HourStep, Pixel, ProductGrid, FILL_THRESHOLD};

use crate::model::ProductSelection;

/// What the caller expects from a payload.
#[derive(Debug, Clone, Copy)]
pub struct SplitRequest<'a> {
    pub date: NaiveDate,
    pub hours: &'a [u8],
    pub selection: &'a ProductSelection,
    /// Cache namespace the artifacts are published under.
    pub fingerprint: &'a str,
}

/// One hour ready to publish.
#[derive(Debug, Clone)]
pub struct SplitHour {
    pub hour: u8,
    pub bytes: Vec<u8>,
    pub kept: usize,
    pub dropped: usize,
}

/// Parse `raw`, check it covers every requested hour for every selected product,
/// filter pixels and serialize one document per hour, ordered by hour.
///
/// An hour whose pixels are all filtered out still produces an (empty) artifact;
/// coverage is about the hour being present, not about it being useful.
pub fn split(raw: &[u8], req: &SplitRequest<'_>) -> Result<Vec<SplitHour>, SplitError> {
    let payload: DailyPayload =
        serde_json::from_slice(raw).map_err(|e| SplitError::Malformed(e.to_string()))?;
    if payload.date != req.date {
        return Err(SplitError::Malformed(format!(
            "payload is for {}, expected {}",
            payload.date, req.date
        )));
    }
    if let Some(step) = payload.steps.iter().find(|s| s.hour > 23) {
        return Err(SplitError::Malformed(format!("hour {} out of range", step.hour)));
    }

    let mut by_hour: BTreeMap<u8, BTreeMap<_, Vec<Pixel>>> = BTreeMap::new();
    for step in payload.steps {
        if !req.selection.products().contains(&step.product) {
            continue;
        }
        by_hour
            .entry(step.hour)
            .or_default()
            .entry(step.product)
            .or_default()
            .extend(step.pixels);
    }

    let wanted: BTreeSet<u8> = req.hours.iter().copied().collect();
    let missing: Vec<u8> = wanted
        .iter()
        .copied()
        .filter(|h| {
            by_hour.get(h).map_or(true, |products| {
                req.selection
                    .products()
                    .iter()
                    .any(|p| !products.contains_key(p))
            })
        })
        .collect();
    if !missing.is_empty() {
        return Err(SplitError::PartialCoverage {
            date: req.date,
            missing,
        });
    }

    let filters = req.selection.filters();
    let mut out = Vec::with_capacity(wanted.len());
    for hour in wanted {
        let Some(products) = by_hour.remove(&hour) else {
            continue;
        };
        let mut variables = BTreeMap::new();
        let (mut kept, mut dropped) = (0, 0);
        for (product, pixels) in products {
            let total = pixels.len();
            let pixels: Vec<Pixel> = pixels
                .into_iter()
                .filter(|p| {
                    !p.is_fill() && filters.accepts(p.quality, p.cloud_fraction, p.solar_zenith)
                })
                .collect();
            let grid = ProductGrid {
                kept: pixels.len(),
                dropped: total - pixels.len(),
                pixels,
            };
            kept += grid.kept;
            dropped += grid.dropped;
            variables.insert(product, grid);
        }
        let doc = HourArtifact {
            date: req.date,
            hour,
            fingerprint: req.fingerprint.to_string(),
            products: req.selection.products().to_vec(),
            filters: *filters,
            variables,
        };
        let bytes = serde_json::to_vec(&doc).map_err(|e| SplitError::Malformed(e.to_string()))?;
        out.push(SplitHour {
            hour,
            bytes,
            kept,
            dropped,
        });
    }
    Ok(out)
}
