//! CLI command handlers, one file per command.

mod cancel;
mod create;
mod import;
mod recover;
mod remove;
mod run;
mod status;

pub use cancel::run_cancel;
pub use create::{run_create, CreateArgs};
pub use import::run_import;
pub use recover::run_recover;
pub use remove::run_remove;
pub use run::run_jobs;
pub use status::run_status;

use anyhow::Result;
use tempo_core::cache::HourCache;
use tempo_core::config::TempoConfig;

/// Artifact cache at the configured data dir.
fn open_cache(cfg: &TempoConfig) -> Result<HourCache> {
    Ok(HourCache::new(cfg.data_dir()?))
}
