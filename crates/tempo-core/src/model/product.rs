//! Product selection and the quality filters applied when splitting.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::Region;

/// Length of the hex fingerprint that namespaces cached artifacts.
const FINGERPRINT_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("at least one product must be selected")]
    NoProducts,
    #[error("unknown product {0:?} (expected no2, hcho or o3)")]
    UnknownProduct(String),
    #[error("unknown quality tier {0:?} (expected low, normal or high)")]
    UnknownQuality(String),
    #[error("max cloud fraction {0}% is outside 0..=100")]
    CloudOutOfRange(f64),
    #[error("max solar zenith angle {0} deg is outside 0..=90")]
    SzaOutOfRange(f64),
}

/// Atmospheric products the upstream service can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
    No2,
    Hcho,
    O3,
}

impl Product {
    pub const ALL: [Product; 3] = [Product::No2, Product::Hcho, Product::O3];

    /// Short name used in artifact file names.
    pub fn short_name(self) -> &'static str {
        match self {
            Product::No2 => "no2",
            Product::Hcho => "hcho",
            Product::O3 => "o3",
        }
    }

    /// Variable identifier requested from the upstream service.
    pub fn remote_id(self) -> &'static str {
        match self {
            Product::No2 => "tempo.l2.no2.vertical_column_troposphere",
            Product::Hcho => "tempo.l2.hcho.vertical_column",
            Product::O3 => "tempo.l2.o3tot.column_amount_o3",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for Product {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no2" => Ok(Product::No2),
            "hcho" => Ok(Product::Hcho),
            "o3" | "o3tot" => Ok(Product::O3),
            _ => Err(SelectionError::UnknownProduct(s.to_string())),
        }
    }
}

/// Retrieval quality flag, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Normal,
    High,
}

impl QualityTier {
    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Normal => "normal",
            QualityTier::High => "high",
        }
    }
}

impl FromStr for QualityTier {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(QualityTier::Low),
            "normal" => Ok(QualityTier::Normal),
            "high" => Ok(QualityTier::High),
            _ => Err(SelectionError::UnknownQuality(s.to_string())),
        }
    }
}

/// Per-pixel acceptance thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityFilters {
    pub min_quality: QualityTier,
    /// Maximum effective cloud fraction, in percent.
    pub max_cloud_pct: f64,
    /// Maximum solar zenith angle, in degrees.
    pub max_sza_deg: f64,
}

impl Default for QualityFilters {
    fn default() -> Self {
        Self {
            min_quality: QualityTier::Normal,
            max_cloud_pct: 50.0,
            max_sza_deg: 70.0,
        }
    }
}

impl QualityFilters {
    pub fn validate(&self) -> Result<(), SelectionError> {
        if !(0.0..=100.0).contains(&self.max_cloud_pct) {
            return Err(SelectionError::CloudOutOfRange(self.max_cloud_pct));
        }
        if !(0.0..=90.0).contains(&self.max_sza_deg) {
            return Err(SelectionError::SzaOutOfRange(self.max_sza_deg));
        }
        Ok(())
    }

    /// `cloud_fraction` is 0..=1 as delivered upstream.
    pub fn accepts(&self, quality: QualityTier, cloud_fraction: f64, solar_zenith: f64) -> bool {
        quality >= self.min_quality
            && cloud_fraction * 100.0 <= self.max_cloud_pct
            && solar_zenith <= self.max_sza_deg
    }
}

/// Non-empty, ordered, de-duplicated product set plus the filters applied to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSelection {
    products: Vec<Product>,
    filters: QualityFilters,
}

impl ProductSelection {
    pub fn new(
        products: impl IntoIterator<Item = Product>,
        filters: QualityFilters,
    ) -> Result<Self, SelectionError> {
        let mut products: Vec<Product> = products.into_iter().collect();
        products.sort();
        products.dedup();
        if products.is_empty() {
            return Err(SelectionError::NoProducts);
        }
        filters.validate()?;
        Ok(Self { products, filters })
    }

    /// Parse a comma separated list such as `no2,hcho`.
    pub fn parse(list: &str, filters: QualityFilters) -> Result<Self, SelectionError> {
        let products = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Product>, _>>()?;
        Self::new(products, filters)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn filters(&self) -> &QualityFilters {
        &self.filters
    }

    /// File-name label: product short names joined by `-`.
    pub fn label(&self) -> String {
        self.products
            .iter()
            .map(|p| p.short_name())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Stable digest of the area, products and filters. Two requests that would
    /// produce different artifact content never share a fingerprint. The region
    /// label is not part of it; only the box is.
    pub fn fingerprint(&self, region: &Region) -> String {
        let [west, south, east, north] = region.bbox();
        let canonical = format!(
            "bbox={west:.4},{south:.4},{east:.4},{north:.4};products={};min_quality={};max_cloud_pct={:.3};max_sza_deg={:.3}",
            self.label(),
            self.filters.min_quality.as_str(),
            self.filters.max_cloud_pct,
            self.filters.max_sza_deg,
        );
        let digest = Sha256::digest(canonical.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(FINGERPRINT_LEN);
        hex
    }
}
