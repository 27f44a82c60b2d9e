//! One claimed day: cache probe, fetch, split, publish, settle.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use super::progress::ProgressEvent;
use super::queue::unix_millis;
use super::run::RunContext;
use crate::fetch::{DayRequest, FetchError, SessionContext};
use crate::retry::{AttemptError, DayError};
use crate::splitter::{split, SplitRequest};
use crate::task::{DayTask, FailOutcome};

/// How long an abandoned fetch (timeout or cancel) gets to notice its token
/// before the claim is released anyway.
const ABANDON_GRACE: Duration = Duration::from_secs(2);

pub(super) enum DayOutcome {
    Done,
    CacheHit,
    /// Failed but retryable; back to the queue with a backoff.
    Requeued(DayTask),
    Failed,
    /// Run halted mid-attempt; the day is Pending again.
    Interrupted,
}

pub(super) async fn process_day(
    worker: usize,
    ctx: &RunContext,
    mut task: DayTask,
) -> Result<DayOutcome> {
    let job_id = ctx.job.id;
    let date = task.date();
    let ledger = &ctx.engine.ledger;

    let cached = {
        let cache = ctx.engine.cache.clone();
        let ns = ctx.ns.clone();
        let hours = ctx.job.request.hours.clone();
        tokio::task::spawn_blocking(move || cache.day_artifacts(&ns, date, &hours))
            .await
            .context("cache probe panicked")?
    };
    if let Some(artifacts) = cached {
        task.satisfy_from_cache(artifacts)?;
        ledger.persist_task(&task).await?;
        ctx.progress.record(ProgressEvent::CacheHit);
        tracing::debug!(job_id, %date, worker, "day satisfied from cache");
        return Ok(DayOutcome::CacheHit);
    }

    task.claim()?;
    ledger.persist_task(&task).await?;
    ctx.progress.record(ProgressEvent::FetchStarted);
    let attempt = task.attempts() + 1;
    tracing::info!(job_id, %date, attempt, worker, "fetching day");

    // Scratch dir lives until this function returns, on every path.
    let scratch = tempfile::Builder::new()
        .prefix(&format!("tempo-job{job_id}-w{worker}-"))
        .tempdir();
    let fetched = match &scratch {
        Ok(dir) => fetch_payload(worker, ctx, &task, dir.path()).await,
        Err(e) => Err(AttemptError::Fetch(FetchError::Io(std::io::Error::new(
            e.kind(),
            e.to_string(),
        )))),
    };
    let payload = match fetched {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return interrupted(ctx, task).await,
        Err(source) => return settle_failure(ctx, task, attempt, source).await,
    };

    task.fetched()?;
    ledger.persist_task(&task).await?;

    match split_and_publish(ctx, &task, payload).await? {
        Ok(artifacts) => {
            let n = artifacts.len();
            task.complete(artifacts)?;
            ledger.persist_task(&task).await?;
            ctx.progress.record(ProgressEvent::Done);
            tracing::info!(job_id, %date, attempt, worker, hours = n, "day done");
            Ok(DayOutcome::Done)
        }
        Err(source) => settle_failure(ctx, task, attempt, source).await,
    }
}

/// Fetch on the blocking pool under the per-attempt deadline. `Ok(None)` means
/// the run was halted.
async fn fetch_payload(
    worker: usize,
    ctx: &RunContext,
    task: &DayTask,
    workdir: &Path,
) -> Result<Option<Vec<u8>>, AttemptError> {
    let attempt_token = ctx.halt.child_token();
    let session = SessionContext {
        worker,
        workdir: workdir.to_path_buf(),
        cancel: attempt_token.clone(),
    };
    let mut client = ctx.engine.clients.open_session(&session)?;
    let request = DayRequest {
        job_id: ctx.job.id,
        date: task.date(),
        hours: ctx.job.request.hours.clone(),
        region: ctx.job.request.region.clone(),
        selection: ctx.job.request.selection.clone(),
        auth: ctx.job.request.auth.clone(),
    };
    let mut handle = tokio::task::spawn_blocking(move || client.fetch_day(&request));
    let timeout = ctx.engine.fetch_timeout;

    let joined = tokio::select! {
        _ = ctx.halt.cancelled() => None,
        res = tokio::time::timeout(timeout, &mut handle) => Some(res),
    };
    let result = match joined {
        None => {
            attempt_token.cancel();
            let _ = tokio::time::timeout(ABANDON_GRACE, handle).await;
            return Ok(None);
        }
        Some(Err(_elapsed)) => {
            attempt_token.cancel();
            if tokio::time::timeout(ABANDON_GRACE, handle).await.is_err() {
                tracing::warn!(job_id = ctx.job.id, date = %task.date(), "timed-out fetch still running");
            }
            return Err(AttemptError::Timeout(timeout));
        }
        Some(Ok(joined)) => joined,
    };
    match result {
        Ok(Ok(bytes)) => Ok(Some(bytes)),
        Ok(Err(FetchError::Cancelled)) if ctx.halt.is_cancelled() => Ok(None),
        Ok(Err(e)) => Err(e.into()),
        Err(join) => Err(FetchError::Rejected(format!("fetch session aborted: {join}")).into()),
    }
}

/// Split and publish on the blocking pool. The outer error is an internal
/// failure (panic); the inner one is a normal attempt failure.
async fn split_and_publish(
    ctx: &RunContext,
    task: &DayTask,
    payload: Vec<u8>,
) -> Result<Result<Vec<String>, AttemptError>> {
    let cache = ctx.engine.cache.clone();
    let ns = ctx.ns.clone();
    let selection = ctx.job.request.selection.clone();
    let hours = ctx.job.request.hours.clone();
    let date = task.date();
    tokio::task::spawn_blocking(move || -> Result<Vec<String>, AttemptError> {
        let req = SplitRequest {
            date,
            hours: &hours,
            selection: &selection,
            fingerprint: ns.fingerprint(),
        };
        let split_hours = split(&payload, &req)?;
        let mut artifacts = Vec::with_capacity(split_hours.len());
        for h in split_hours {
            tracing::debug!(%date, hour = h.hour, kept = h.kept, dropped = h.dropped, "publishing hour");
            artifacts.push(cache.publish(&ns.key(date, h.hour), &h.bytes)?);
        }
        Ok(artifacts)
    })
    .await
    .context("split task panicked")
}

async fn interrupted(ctx: &RunContext, mut task: DayTask) -> Result<DayOutcome> {
    task.revert();
    ctx.engine.ledger.persist_task(&task).await?;
    tracing::info!(job_id = ctx.job.id, date = %task.date(), "day interrupted; back to pending");
    Ok(DayOutcome::Interrupted)
}

async fn settle_failure(
    ctx: &RunContext,
    mut task: DayTask,
    attempt: u32,
    source: AttemptError,
) -> Result<DayOutcome> {
    let job_id = ctx.job.id;
    let date = task.date();
    let error = DayError {
        job_id,
        date,
        attempt,
        source,
    };

    if error.source.is_job_fatal() {
        task.revert();
        ctx.engine.ledger.persist_task(&task).await?;
        ctx.abort_fatal(error.source.to_string());
        return Ok(DayOutcome::Interrupted);
    }

    let outcome = task.fail(&error, &ctx.engine.retry, unix_millis())?;
    ctx.engine.ledger.persist_task(&task).await?;
    match outcome {
        FailOutcome::Requeued { delay } => {
            tracing::warn!(
                job_id,
                %date,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "day attempt failed, will retry: {}",
                error.source
            );
            Ok(DayOutcome::Requeued(task))
        }
        FailOutcome::Terminal => {
            ctx.progress.record(ProgressEvent::Failed);
            tracing::error!(job_id, %date, attempt, "day failed: {}", error.source);
            Ok(DayOutcome::Failed)
        }
    }
}
