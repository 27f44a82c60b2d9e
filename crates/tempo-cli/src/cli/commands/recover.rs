//! `tempo recover` – reconcile ledger with cache and report what changed.

use anyhow::Result;
use tempo_core::config::TempoConfig;
use tempo_core::ledger::Ledger;
use tempo_core::recovery::recover;

use super::open_cache;

pub async fn run_recover(ledger: &Ledger, cfg: &TempoConfig) -> Result<()> {
    let cache = open_cache(cfg)?;
    let recovered = recover(ledger, &cache).await?;
    if recovered.is_empty() {
        println!("No unfinished jobs.");
        return Ok(());
    }
    println!("{:<6} {:<20} {:>6} {:>9} {:>8}", "ID", "STATUS", "RESET", "PROMOTED", "PENDING");
    for r in recovered {
        println!(
            "{:<6} {:<20} {:>6} {:>9} {:>8}",
            r.job_id,
            r.status.as_str(),
            r.stats.reset,
            r.stats.promoted,
            r.pending
        );
    }
    Ok(())
}
