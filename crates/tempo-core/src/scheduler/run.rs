//! Run one job: reconcile, spawn workers, collect the report.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::progress::{ProgressStats, ProgressTracker};
use super::queue::DayQueue;
use super::worker::run_worker;
use crate::cache::{ArtifactNamespace, HourCache};
use crate::fetch::ClientFactory;
use crate::ledger::{JobRecord, Ledger};
use crate::model::{clamp_workers, JobId, JobStatus};
use crate::recovery::reconcile_job;
use crate::retry::RetryPolicy;
use crate::task::DayStatus;

/// Everything a run needs, shared by all jobs of a process.
#[derive(Clone)]
pub struct Engine {
    pub ledger: Ledger,
    pub cache: HourCache,
    pub clients: Arc<dyn ClientFactory>,
    pub retry: RetryPolicy,
    /// Per-attempt fetch deadline.
    pub fetch_timeout: Duration,
}

#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// Overrides the job's stored worker count (still clamped to 1..=8).
    pub workers: Option<usize>,
    pub progress_tx: Option<mpsc::Sender<ProgressStats>>,
}

/// A condition no day can succeed under; the run stops and the job records it.
#[derive(Debug, Error)]
#[error("job {job_id} aborted: {reason}")]
pub struct JobFatal {
    pub job_id: JobId,
    pub reason: String,
}

/// Outcome of one `run_job` call.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: JobId,
    pub status: JobStatus,
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub pending: usize,
    pub fetch_calls: usize,
    pub cache_hits: usize,
    /// The caller's token fired before the queue drained.
    pub cancelled: bool,
}

/// State shared by the workers of one run.
pub(super) struct RunContext {
    pub(super) engine: Engine,
    pub(super) job: JobRecord,
    pub(super) ns: ArtifactNamespace,
    pub(super) queue: DayQueue,
    pub(super) progress: ProgressTracker,
    /// Fires on caller cancellation or a job-level fatal error.
    pub(super) halt: CancellationToken,
    fatal: Mutex<Option<String>>,
}

impl RunContext {
    /// Record the first fatal reason and stop every worker.
    pub(super) fn abort_fatal(&self, reason: String) {
        let mut slot = self.fatal.lock().unwrap_or_else(|e| e.into_inner());
        slot.get_or_insert(reason);
        self.halt.cancel();
    }

    fn take_fatal(&self) -> Option<String> {
        self.fatal.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

async fn fail_job(engine: &Engine, job_id: JobId, reason: String) -> anyhow::Error {
    tracing::error!(job_id, %reason, "job aborted");
    if let Err(e) = engine.ledger.set_fatal_error(job_id, &reason).await {
        tracing::warn!(job_id, "could not record fatal error: {:#}", e);
    }
    JobFatal { job_id, reason }.into()
}

/// Run a job until every day task is terminal, `cancel` fires, or a job-level
/// fatal error occurs (returned as [`JobFatal`]).
///
/// Re-running a finished job is a no-op: it reconciles, finds nothing Pending
/// and returns without a fetch.
pub async fn run_job(
    engine: &Engine,
    job_id: JobId,
    options: RunOptions,
    cancel: CancellationToken,
) -> Result<JobReport> {
    let job = engine
        .ledger
        .get_job(job_id)
        .await?
        .with_context(|| format!("job {job_id} not found"))?;

    let writable = {
        let cache = engine.cache.clone();
        tokio::task::spawn_blocking(move || cache.ensure_writable())
            .await
            .context("writability probe panicked")?
    };
    if let Err(e) = writable {
        return Err(fail_job(engine, job_id, e.to_string()).await);
    }
    engine.ledger.clear_fatal_error(job_id).await?;

    let (tasks, _) = reconcile_job(&engine.ledger, &engine.cache, &job).await?;
    let total = tasks.len();
    let done = tasks.iter().filter(|t| t.status() == DayStatus::Done).count();
    let failed = tasks.iter().filter(|t| t.status() == DayStatus::Failed).count();
    let pending: Vec<_> = tasks
        .into_iter()
        .filter(|t| t.status() == DayStatus::Pending)
        .collect();

    let workers = clamp_workers(options.workers.unwrap_or(job.request.workers))
        .min(pending.len())
        .max(1);
    tracing::info!(
        job_id,
        name = %job.request.name,
        total,
        pending = pending.len(),
        workers,
        "starting job run"
    );

    let halt = cancel.child_token();
    let ctx = Arc::new(RunContext {
        engine: engine.clone(),
        ns: ArtifactNamespace::for_job(&job.request),
        job,
        queue: DayQueue::new(pending),
        progress: ProgressTracker::new(job_id, total, done, failed, options.progress_tx),
        halt,
        fatal: Mutex::new(None),
    });

    let mut join_set = JoinSet::new();
    for worker in 1..=workers {
        join_set.spawn(run_worker(worker, Arc::clone(&ctx)));
    }
    let mut first_err: Option<anyhow::Error> = None;
    while let Some(res) = join_set.join_next().await {
        let res = res.map_err(|e| anyhow::anyhow!("worker task join: {}", e)).and_then(|r| r);
        if let Err(e) = res {
            // Stop the others; their in-flight days revert to Pending.
            ctx.halt.cancel();
            first_err.get_or_insert(e);
        }
    }
    if let Some(e) = first_err {
        return Err(e.context(format!("job {job_id} run failed")));
    }
    if let Some(reason) = ctx.take_fatal() {
        return Err(fail_job(engine, job_id, reason).await);
    }

    let final_tasks = engine.ledger.load_tasks(job_id).await?;
    let stats = ctx.progress.snapshot();
    let count = |s: DayStatus| final_tasks.iter().filter(|t| t.status() == s).count();
    let report = JobReport {
        job_id,
        status: JobStatus::derive(final_tasks.iter().map(|t| t.status())),
        total: final_tasks.len(),
        done: count(DayStatus::Done),
        failed: count(DayStatus::Failed),
        pending: count(DayStatus::Pending),
        fetch_calls: stats.fetch_calls,
        cache_hits: stats.cache_hits,
        cancelled: cancel.is_cancelled(),
    };
    tracing::info!(
        job_id,
        status = %report.status,
        done = report.done,
        failed = report.failed,
        pending = report.pending,
        fetch_calls = report.fetch_calls,
        cancelled = report.cancelled,
        "job run finished"
    );
    Ok(report)
}
