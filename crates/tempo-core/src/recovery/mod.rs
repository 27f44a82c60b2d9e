//! Crash recovery.
//!
//! [`reconcile`] is a pure function of what the ledger says and what the cache
//! holds. No process-global "job is running" state survives a restart, so a
//! day recorded as Fetching or Splitting is stale by definition: it goes back
//! to Pending, and any Pending day whose artifacts are all cached is Done.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::cache::{ArtifactNamespace, HourCache};
use crate::ledger::{JobRecord, Ledger};
use crate::model::{JobId, JobStatus};
use crate::task::{DayStatus, DayTask};

/// Snapshot of which complete days exist in the cache for one job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheView {
    complete: HashMap<NaiveDate, Vec<String>>,
}

impl CacheView {
    /// Probe the cache for every non-terminal day of `tasks`.
    pub fn probe(cache: &HourCache, ns: &ArtifactNamespace, hours: &[u8], tasks: &[DayTask]) -> Self {
        let complete = tasks
            .iter()
            .filter(|t| !t.status().is_terminal())
            .filter_map(|t| {
                cache
                    .day_artifacts(ns, t.date(), hours)
                    .map(|refs| (t.date(), refs))
            })
            .collect();
        Self { complete }
    }

    /// Record a day as fully cached.
    pub fn with_day(mut self, date: NaiveDate, artifacts: Vec<String>) -> Self {
        self.complete.insert(date, artifacts);
        self
    }

    pub fn day(&self, date: NaiveDate) -> Option<&Vec<String>> {
        self.complete.get(&date)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Fetching/Splitting rows reset to Pending.
    pub reset: usize,
    /// Pending rows promoted to Done from the cache.
    pub promoted: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub tasks: Vec<DayTask>,
    /// Tasks whose state differs from the input; these need persisting.
    pub changed: Vec<DayTask>,
    pub stats: ReconcileStats,
}

/// `(ledger state, cache contents) -> reconciled state`. Done and Failed are
/// never touched; Failed stays terminal even if artifacts later appear.
pub fn reconcile(tasks: &[DayTask], cache: &CacheView) -> Reconciled {
    let mut stats = ReconcileStats::default();
    let mut out = Vec::with_capacity(tasks.len());
    let mut changed = Vec::new();
    for task in tasks {
        let mut t = task.clone();
        if t.revert() {
            stats.reset += 1;
        }
        if t.status() == DayStatus::Pending {
            if let Some(refs) = cache.day(t.date()) {
                // Cannot fail: status was just checked.
                if t.satisfy_from_cache(refs.clone()).is_ok() {
                    stats.promoted += 1;
                }
            }
        }
        if &t != task {
            changed.push(t.clone());
        }
        out.push(t);
    }
    Reconciled {
        tasks: out,
        changed,
        stats,
    }
}

/// Reconcile one job against the cache and persist the result.
pub async fn reconcile_job(
    ledger: &Ledger,
    cache: &HourCache,
    job: &JobRecord,
) -> Result<(Vec<DayTask>, ReconcileStats)> {
    let tasks = ledger.load_tasks(job.id).await?;
    let ns = ArtifactNamespace::for_job(&job.request);
    let view = {
        let cache = cache.clone();
        let hours = job.request.hours.clone();
        let tasks = tasks.clone();
        tokio::task::spawn_blocking(move || CacheView::probe(&cache, &ns, &hours, &tasks))
            .await
            .context("cache probe task panicked")?
    };
    let r = reconcile(&tasks, &view);
    ledger
        .persist_tasks(&r.changed)
        .await
        .with_context(|| format!("failed to persist reconciled tasks for job {}", job.id))?;
    if r.stats != ReconcileStats::default() {
        tracing::info!(
            job_id = job.id,
            reset = r.stats.reset,
            promoted = r.stats.promoted,
            "reconciled job with cache"
        );
    }
    Ok((r.tasks, r.stats))
}

/// Outcome of recovering one job at startup.
#[derive(Debug, Clone)]
pub struct RecoveredJob {
    pub job_id: JobId,
    pub stats: ReconcileStats,
    pub pending: usize,
    pub status: JobStatus,
}

/// Startup pass: sweep interrupted publishes, then reconcile every unfinished job.
pub async fn recover(ledger: &Ledger, cache: &HourCache) -> Result<Vec<RecoveredJob>> {
    let swept = {
        let cache = cache.clone();
        tokio::task::spawn_blocking(move || cache.sweep_stale_temps())
            .await
            .context("temp sweep task panicked")??
    };
    if swept > 0 {
        tracing::info!(swept, "removed stale temp files from cache");
    }

    let mut out = Vec::new();
    for job_id in ledger.list_unfinished_jobs().await? {
        let Some(job) = ledger.get_job(job_id).await? else {
            continue;
        };
        let (tasks, stats) = reconcile_job(ledger, cache, &job).await?;
        out.push(RecoveredJob {
            job_id,
            stats,
            pending: tasks
                .iter()
                .filter(|t| t.status() == DayStatus::Pending)
                .count(),
            status: JobStatus::derive(tasks.iter().map(|t| t.status())),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests;
