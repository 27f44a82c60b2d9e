//! Worker loop: claim, process, release, until the queue drains or the run halts.

use std::sync::Arc;

use anyhow::Result;

use super::day::{process_day, DayOutcome};
use super::guard::ClaimGuard;
use super::queue::{unix_millis, Claim};
use super::run::RunContext;

pub(super) async fn run_worker(worker: usize, ctx: Arc<RunContext>) -> Result<()> {
    let job_id = ctx.job.id;
    tracing::debug!(job_id, worker, "worker started");
    loop {
        if ctx.halt.is_cancelled() {
            break;
        }
        match ctx.queue.claim(unix_millis()) {
            Claim::Drained => break,
            Claim::Wait(max) => {
                tokio::select! {
                    _ = ctx.halt.cancelled() => break,
                    _ = ctx.queue.idle(max) => {}
                }
            }
            Claim::Ready(task) => {
                let guard = ClaimGuard::new(&ctx.queue);
                if let DayOutcome::Requeued(task) = process_day(worker, &ctx, task).await? {
                    guard.requeue(task);
                }
            }
        }
    }
    tracing::debug!(job_id, worker, "worker stopped");
    Ok(())
}
