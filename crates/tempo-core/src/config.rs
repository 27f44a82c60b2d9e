use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{clamp_workers, hour_range, AuthMode, QualityFilters, Region, RegionError};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("max_cloud_pct {0} is outside 0..=100")]
    CloudOutOfRange(f64),
    #[error("max_sza_deg {0} is outside 0..=90")]
    SzaOutOfRange(f64),
    #[error("hour window {start}..={end} is invalid (hours are 0..=23, start <= end)")]
    HourWindow { start: u8, end: u8 },
    #[error("retry.max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("fetch_timeout_secs must be at least 1")]
    ZeroTimeout,
    #[error("region preset {name:?}: {source}")]
    Region {
        name: String,
        #[source]
        source: RegionError,
    },
    #[error("unknown region preset {0:?}")]
    UnknownRegion(String),
}

/// Retry policy parameters (`[retry]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per day (including the first).
    pub max_attempts: u32,
    /// Attempt cap for malformed or partial payloads.
    pub payload_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            payload_attempts: 2,
            base_delay_secs: 0.5,
            max_delay_secs: 60,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            payload_attempts: self.payload_attempts,
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

fn default_regions() -> BTreeMap<String, [f64; 4]> {
    [
        ("southern_california", [-119.68, 32.23, -116.38, 35.73]),
        ("salt_lake", [-112.8, 40.0, -111.5, 41.5]),
        ("houston", [-96.5, 29.0, -94.5, 30.5]),
        ("phoenix", [-113.3, 32.8, -111.0, 34.2]),
        ("denver", [-105.5, 39.3, -104.3, 40.2]),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Global configuration loaded from `~/.config/tempo/config.toml`.
///
/// Plain values come before tables so the file serializes cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Artifact cache root. Defaults to `~/.local/share/tempo/artifacts`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Concurrent workers per job (clamped to 1..=8).
    pub workers: usize,
    /// First UTC hour fetched for new jobs (inclusive).
    pub hour_start: u8,
    /// Last UTC hour fetched for new jobs (inclusive).
    pub hour_end: u8,
    /// Per-attempt fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Base URL of the daily batch API.
    pub endpoint: String,
    /// `"anonymous"` or `{ key = "..." }`.
    pub auth: AuthMode,
    /// Default quality filters for new jobs.
    pub filters: QualityFilters,
    pub retry: RetryConfig,
    /// Named regions as `[west, south, east, north]`.
    pub regions: BTreeMap<String, [f64; 4]>,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            workers: 4,
            hour_start: 14,
            hour_end: 23,
            fetch_timeout_secs: 180,
            endpoint: "https://ofmpub.epa.gov/rsig/rsigserver".to_string(),
            auth: AuthMode::Anonymous,
            filters: QualityFilters::default(),
            retry: RetryConfig::default(),
            regions: default_regions(),
        }
    }
}

impl TempoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.filters.max_cloud_pct) {
            return Err(ConfigError::CloudOutOfRange(self.filters.max_cloud_pct));
        }
        if !(0.0..=90.0).contains(&self.filters.max_sza_deg) {
            return Err(ConfigError::SzaOutOfRange(self.filters.max_sza_deg));
        }
        if self.hour_start > self.hour_end || self.hour_end > 23 {
            return Err(ConfigError::HourWindow {
                start: self.hour_start,
                end: self.hour_end,
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        for (name, bbox) in &self.regions {
            Region::from_bbox(*bbox).map_err(|source| ConfigError::Region {
                name: name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn effective_workers(&self) -> usize {
        clamp_workers(self.workers)
    }

    pub fn hours(&self) -> Vec<u8> {
        hour_range(self.hour_start, self.hour_end)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }

    /// Resolve a preset by name (case-insensitive, spaces and dashes treated as `_`).
    pub fn region(&self, name: &str) -> Result<Region, ConfigError> {
        let wanted = name.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let (key, bbox) = self
            .regions
            .iter()
            .find(|(k, _)| k.to_ascii_lowercase() == wanted)
            .ok_or_else(|| ConfigError::UnknownRegion(name.to_string()))?;
        Region::from_bbox(*bbox)
            .map(|r| r.with_label(key.clone()))
            .map_err(|source| ConfigError::Region {
                name: key.clone(),
                source,
            })
    }

    /// Artifact root: the configured `data_dir` or the XDG data default.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tempo")?;
        Ok(xdg_dirs.place_data_file("artifacts")?)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tempo")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TempoConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TempoConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: TempoConfig =
        toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
