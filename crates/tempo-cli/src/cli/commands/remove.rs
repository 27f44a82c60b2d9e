//! `tempo remove <id>` – remove a job; optionally delete its artifacts with --delete-artifacts.

use anyhow::{bail, Result};
use tempo_core::config::TempoConfig;
use tempo_core::ledger::Ledger;
use tempo_core::model::JobId;

use super::open_cache;

/// Removes the job from the ledger. With `delete_artifacts`, also deletes the
/// hour files its Done days point at, except those another job still records.
pub async fn run_remove(
    ledger: &Ledger,
    cfg: &TempoConfig,
    id: JobId,
    delete_artifacts: bool,
) -> Result<()> {
    let mut deleted = 0usize;
    if delete_artifacts {
        let cache = open_cache(cfg)?;
        let shared = ledger.artifacts_referenced_elsewhere(id).await?;
        for task in ledger.load_tasks(id).await? {
            for rel in task.artifacts().iter().filter(|a| !shared.contains(*a)) {
                let path = cache.root().join(rel);
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {
                        tracing::debug!(path = %path.display(), "deleted artifact");
                        deleted += 1;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => tracing::warn!(path = %path.display(), "could not delete artifact: {}", e),
                }
            }
        }
    }

    if !ledger.remove_job(id).await? {
        bail!("job {id} not found");
    }
    if delete_artifacts {
        println!("Removed job {id} and {deleted} artifact(s)");
    } else {
        println!("Removed job {id}");
    }
    Ok(())
}
