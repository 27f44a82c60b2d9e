//! CLI for the tempo fetch-and-split engine.

mod commands;
mod control_socket;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tempo_core::config;
use tempo_core::ledger::Ledger;
use tempo_core::model::{JobId, QualityTier, Weekdays};

use commands::{
    run_cancel, run_create, run_import, run_jobs, run_recover, run_remove, run_status,
};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tempo")]
#[command(about = "tempo: resumable day-batched downloads of hourly satellite column products", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Exactly one way of naming the region.
#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct RegionArgs {
    /// Region preset from config.toml (e.g. southern_california).
    #[arg(long)]
    pub region: Option<String>,
    /// Bounding box as WEST,SOUTH,EAST,NORTH.
    #[arg(long, value_name = "W,S,E,N", value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: Option<[f64; 4]>,
    /// Centre point as LAT,LON (see --radius-km).
    #[arg(long, value_name = "LAT,LON", value_parser = parse_center, allow_hyphen_values = true)]
    pub center: Option<(f64, f64)>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Create a job for a region and date range.
    Create {
        #[command(flatten)]
        region: RegionArgs,
        /// Half side of the box built around --center, in km.
        #[arg(long, default_value_t = 10.0)]
        radius_km: f64,
        /// First day (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,
        /// Last day, inclusive (YYYY-MM-DD).
        #[arg(long)]
        end: NaiveDate,
        /// Comma separated products: no2, hcho, o3.
        #[arg(long, default_value = "no2")]
        products: String,
        /// Job name (defaults to region + date range).
        #[arg(long)]
        name: Option<String>,
        /// UTC hours as START-END or a list (14-23, 16,18,20). Defaults to config.
        #[arg(long)]
        hours: Option<String>,
        /// all, weekdays, weekends, or a list such as mon,wed,fri.
        #[arg(long)]
        weekdays: Option<Weekdays>,
        /// Concurrent workers (1-8). Defaults to config.
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
        #[arg(long)]
        min_quality: Option<QualityTier>,
        /// Maximum cloud fraction in percent (0-100).
        #[arg(long)]
        max_cloud: Option<f64>,
        /// Maximum solar zenith angle in degrees.
        #[arg(long)]
        max_sza: Option<f64>,
    },

    /// Recover interrupted work, then run one job or every unfinished job.
    Run {
        /// Job to run; all unfinished jobs when omitted.
        id: Option<JobId>,
        /// Override the job's worker count (1-8).
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
    },

    /// Show all jobs, or the days of one job.
    Status {
        id: Option<JobId>,
    },

    /// Ask a running `tempo run` to cancel a job. Unfinished days stay pending.
    Cancel {
        id: JobId,
    },

    /// Remove a job and its day records.
    Remove {
        id: JobId,
        /// Also delete its artifacts (files other jobs still use are kept).
        #[arg(long)]
        delete_artifacts: bool,
    },

    /// Create one job per row of a CSV file.
    Import {
        path: PathBuf,
        /// Comma separated products for every imported job.
        #[arg(long, default_value = "no2")]
        products: String,
        /// Parse and report without creating jobs.
        #[arg(long)]
        dry_run: bool,
    },

    /// Reconcile the ledger with the artifact cache without running anything.
    Recover,

    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_floats<const N: usize>(s: &str, what: &str) -> Result<[f64; N], String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid {what} {s:?}: {e}"))?;
    parts
        .try_into()
        .map_err(|_| format!("{what} needs {N} comma separated numbers"))
}

fn parse_bbox(s: &str) -> Result<[f64; 4], String> {
    parse_floats::<4>(s, "bbox")
}

fn parse_center(s: &str) -> Result<(f64, f64), String> {
    let [lat, lon] = parse_floats::<2>(s, "center")?;
    Ok((lat, lon))
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        if let CliCommand::Completions { shell } = cli.command {
            clap_complete::generate(shell, &mut Cli::command(), "tempo", &mut std::io::stdout());
            return Ok(());
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let ledger = Ledger::open_default().await?;

        match cli.command {
            CliCommand::Create {
                region,
                radius_km,
                start,
                end,
                products,
                name,
                hours,
                weekdays,
                workers,
                min_quality,
                max_cloud,
                max_sza,
            } => {
                let args = commands::CreateArgs {
                    region,
                    radius_km,
                    start,
                    end,
                    products,
                    name,
                    hours,
                    weekdays,
                    workers,
                    min_quality,
                    max_cloud,
                    max_sza,
                };
                run_create(&ledger, &cfg, args).await?;
            }
            CliCommand::Run { id, workers } => run_jobs(&ledger, &cfg, id, workers).await?,
            CliCommand::Status { id } => run_status(&ledger, id).await?,
            CliCommand::Cancel { id } => run_cancel(id).await?,
            CliCommand::Remove {
                id,
                delete_artifacts,
            } => run_remove(&ledger, &cfg, id, delete_artifacts).await?,
            CliCommand::Import {
                path,
                products,
                dry_run,
            } => run_import(&ledger, &cfg, &path, &products, dry_run).await?,
            CliCommand::Recover => run_recover(&ledger, &cfg).await?,
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
