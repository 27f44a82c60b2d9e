//! Wire shape of a daily payload and of a published hour artifact.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{Product, QualityFilters, QualityTier};

/// Values at or below this are upstream fill values, not measurements.
pub const FILL_THRESHOLD: f64 = -1.0e30;

/// One day of raw data as returned by the upstream service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPayload {
    pub date: NaiveDate,
    pub steps: Vec<HourStep>,
}

/// All pixels of one product for one UTC hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourStep {
    pub hour: u8,
    pub product: Product,
    #[serde(default)]
    pub pixels: Vec<Pixel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pixel {
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
    pub quality: QualityTier,
    /// Effective cloud fraction, 0..=1.
    pub cloud_fraction: f64,
    /// Solar zenith angle in degrees.
    pub solar_zenith: f64,
}

impl Pixel {
    pub fn is_fill(&self) -> bool {
        !self.value.is_finite() || self.value <= FILL_THRESHOLD
    }
}

/// Filtered pixels of one product inside an hour artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductGrid {
    pub kept: usize,
    pub dropped: usize,
    pub pixels: Vec<Pixel>,
}

/// Document written for each hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourArtifact {
    pub date: NaiveDate,
    pub hour: u8,
    pub fingerprint: String,
    pub products: Vec<Product>,
    pub filters: QualityFilters,
    pub variables: BTreeMap<Product, ProductGrid>,
}
