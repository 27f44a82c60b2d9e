//! `tempo create` – create a job from a region, date range and products.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tempo_core::config::TempoConfig;
use tempo_core::ledger::Ledger;
use tempo_core::model::{hour_range, JobRequest, ProductSelection, QualityTier, Region, Weekdays};

use crate::cli::RegionArgs;

#[derive(Debug)]
pub struct CreateArgs {
    pub region: RegionArgs,
    pub radius_km: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub products: String,
    pub name: Option<String>,
    pub hours: Option<String>,
    pub weekdays: Option<Weekdays>,
    pub workers: Option<usize>,
    pub min_quality: Option<QualityTier>,
    pub max_cloud: Option<f64>,
    pub max_sza: Option<f64>,
}

/// `14-23` (inclusive range) or `16,18,20`.
pub(crate) fn parse_hours(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    if let Some((a, b)) = s.split_once('-') {
        let start: u8 = a.trim().parse().with_context(|| format!("invalid hour {a:?}"))?;
        let end: u8 = b.trim().parse().with_context(|| format!("invalid hour {b:?}"))?;
        if start > end {
            bail!("hour range {start}-{end} is inverted");
        }
        return Ok(hour_range(start, end));
    }
    s.split(',')
        .map(|h| {
            h.trim()
                .parse::<u8>()
                .with_context(|| format!("invalid hour {h:?}"))
        })
        .collect()
}

fn resolve_region(cfg: &TempoConfig, args: &RegionArgs, radius_km: f64) -> Result<Region> {
    if let Some(name) = &args.region {
        return Ok(cfg.region(name)?);
    }
    if let Some(bbox) = args.bbox {
        return Ok(Region::from_bbox(bbox)?);
    }
    if let Some((lat, lon)) = args.center {
        return Ok(Region::from_center(lat, lon, radius_km)?);
    }
    bail!("one of --region, --bbox or --center is required")
}

pub(crate) fn build_request(cfg: &TempoConfig, args: CreateArgs) -> Result<JobRequest> {
    let region = resolve_region(cfg, &args.region, args.radius_km)?;

    let mut filters = cfg.filters;
    if let Some(q) = args.min_quality {
        filters.min_quality = q;
    }
    if let Some(c) = args.max_cloud {
        filters.max_cloud_pct = c;
    }
    if let Some(s) = args.max_sza {
        filters.max_sza_deg = s;
    }
    let selection = ProductSelection::parse(&args.products, filters)?;

    let hours = match &args.hours {
        Some(h) => parse_hours(h)?,
        None => cfg.hours(),
    };
    let name = args.name.unwrap_or_else(|| {
        format!(
            "{} {}..{}",
            region.label().unwrap_or("region"),
            args.start,
            args.end
        )
    });

    let request = JobRequest {
        name,
        region,
        selection,
        start_date: args.start,
        end_date: args.end,
        hours,
        weekdays: args.weekdays.unwrap_or_default(),
        workers: args.workers.unwrap_or(cfg.workers),
        auth: cfg.auth.clone(),
    }
    .normalized();
    request.validate()?;
    Ok(request)
}

pub async fn run_create(ledger: &Ledger, cfg: &TempoConfig, args: CreateArgs) -> Result<()> {
    let request = build_request(cfg, args)?;
    let days = request.days().len();
    let id = ledger.create_job(&request).await?;
    println!(
        "Created job {id} \"{}\": {days} day(s), {} hour(s)/day, products {}",
        request.name,
        request.hours.len(),
        request.selection.label()
    );
    Ok(())
}
