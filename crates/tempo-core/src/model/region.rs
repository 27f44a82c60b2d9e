//! Geographic bounding box a job is fetched for.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Approximate km per degree of latitude (constant everywhere on Earth).
const KM_PER_DEG_LAT: f64 = 111.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    #[error("latitude {0} is outside -90..=90")]
    Latitude(f64),
    #[error("longitude {0} is outside -180..=180")]
    Longitude(f64),
    #[error("empty bounding box: lat {min_lat}..{max_lat}, lon {min_lon}..{max_lon}")]
    Empty {
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    },
    #[error("radius must be positive, got {0} km")]
    Radius(f64),
}

/// Immutable bounding box plus an optional human label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

impl Region {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self, RegionError> {
        validate_coordinates(min_lat, min_lon)?;
        validate_coordinates(max_lat, max_lon)?;
        if !(min_lat < max_lat && min_lon < max_lon) {
            return Err(RegionError::Empty {
                min_lat,
                max_lat,
                min_lon,
                max_lon,
            });
        }
        Ok(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
            label: None,
        })
    }

    /// Build from `[west, south, east, north]`, the order used by region presets.
    pub fn from_bbox(bbox: [f64; 4]) -> Result<Self, RegionError> {
        let [west, south, east, north] = bbox;
        Self::new(south, north, west, east)
    }

    /// Square box of side `2 * radius_km` centred on a point, clamped to valid coordinates.
    pub fn from_center(lat: f64, lon: f64, radius_km: f64) -> Result<Self, RegionError> {
        validate_coordinates(lat, lon)?;
        if !(radius_km > 0.0) {
            return Err(RegionError::Radius(radius_km));
        }
        let delta_lat = radius_km / KM_PER_DEG_LAT;
        let cos_lat = lat.to_radians().cos();
        // Near the poles a degree of longitude collapses; take the whole band.
        let (min_lon, max_lon) = if cos_lat < 0.001 {
            (-180.0, 180.0)
        } else {
            let delta_lon = radius_km / (KM_PER_DEG_LAT * cos_lat);
            if delta_lon >= 180.0 {
                (-180.0, 180.0)
            } else {
                ((lon - delta_lon).max(-180.0), (lon + delta_lon).min(180.0))
            }
        };
        Self::new(
            (lat - delta_lat).max(-90.0),
            (lat + delta_lat).min(90.0),
            min_lon,
            max_lon,
        )
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    /// `[west, south, east, north]`.
    pub fn bbox(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

fn validate_coordinates(lat: f64, lon: f64) -> Result<(), RegionError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(RegionError::Latitude(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(RegionError::Longitude(lon));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_order_roundtrip() {
        let r = Region::from_bbox([-119.68, 32.23, -116.38, 35.73]).unwrap();
        assert_eq!(r.min_lat(), 32.23);
        assert_eq!(r.max_lon(), -116.38);
        assert_eq!(r.bbox(), [-119.68, 32.23, -116.38, 35.73]);
    }

    #[test]
    fn inverted_box_rejected() {
        let err = Region::new(40.0, 39.0, -111.0, -110.0).unwrap_err();
        assert!(matches!(err, RegionError::Empty { .. }));
        assert_eq!(
            Region::new(10.0, 95.0, 0.0, 1.0).unwrap_err(),
            RegionError::Latitude(95.0)
        );
    }

    #[test]
    fn center_radius_box() {
        let r = Region::from_center(40.0, -111.0, 11.1).unwrap();
        assert!((r.max_lat() - 40.1).abs() < 1e-9);
        assert!((r.min_lat() - 39.9).abs() < 1e-9);
        // Longitude span widens away from the equator.
        assert!(r.max_lon() - r.min_lon() > r.max_lat() - r.min_lat());
        assert!(r.contains(40.0, -111.0));
        assert!(!r.contains(41.0, -111.0));
    }

    #[test]
    fn center_radius_rejects_non_positive() {
        assert_eq!(
            Region::from_center(0.0, 0.0, 0.0).unwrap_err(),
            RegionError::Radius(0.0)
        );
    }

    #[test]
    fn center_near_pole_is_clamped() {
        let r = Region::from_center(89.99, 10.0, 50.0).unwrap();
        assert_eq!(r.max_lat(), 90.0);
        assert_eq!(r.min_lon(), -180.0);
        assert_eq!(r.max_lon(), 180.0);

        // Wide enough to wrap the globe even though cos(lat) is not tiny.
        let r = Region::from_center(89.9, -150.0, 200.0).unwrap();
        assert_eq!(r.bbox()[0], -180.0);
        assert_eq!(r.bbox()[2], 180.0);
    }
}
