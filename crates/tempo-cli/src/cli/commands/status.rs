//! `tempo status [id]` – list jobs, or the days of one job.

use anyhow::{Context, Result};
use tempo_core::ledger::Ledger;
use tempo_core::model::JobId;

pub async fn run_status(ledger: &Ledger, id: Option<JobId>) -> Result<()> {
    match id {
        Some(id) => show_job(ledger, id).await,
        None => list_jobs(ledger).await,
    }
}

async fn list_jobs(ledger: &Ledger) -> Result<()> {
    let jobs = ledger.list_jobs().await?;
    if jobs.is_empty() {
        println!("No jobs in ledger.");
        return Ok(());
    }
    println!(
        "{:<6} {:<20} {:<12} {:<12} {:>6} {:>6} {:>7}  {}",
        "ID", "STATUS", "START", "END", "DONE", "FAILED", "PENDING", "NAME"
    );
    for j in jobs {
        println!(
            "{:<6} {:<20} {:<12} {:<12} {:>6} {:>6} {:>7}  {}",
            j.id,
            j.status.as_str(),
            j.start_date,
            j.end_date,
            format!("{}/{}", j.done, j.total),
            j.failed,
            j.pending() + j.in_flight,
            j.name
        );
        if let Some(err) = &j.fatal_error {
            println!("       last run aborted: {err}");
        }
    }
    Ok(())
}

async fn show_job(ledger: &Ledger, id: JobId) -> Result<()> {
    let job = ledger
        .get_job(id)
        .await?
        .with_context(|| format!("job {id} not found"))?;
    let req = &job.request;
    println!("Job {id}: {}", req.name);
    println!(
        "  region {:?}  products {}  hours {:?}",
        req.region.bbox(),
        req.selection.label(),
        req.hours
    );
    if let Some(err) = &job.fatal_error {
        println!("  last run aborted: {err}");
    }
    println!("{:<12} {:<10} {:>8} {:>6}  {}", "DATE", "STATUS", "ATTEMPTS", "HOURS", "LAST ERROR");
    for t in ledger.load_tasks(id).await? {
        println!(
            "{:<12} {:<10} {:>8} {:>6}  {}",
            t.date(),
            t.status().as_str(),
            t.attempts(),
            t.artifacts().len(),
            t.last_error().unwrap_or("-")
        );
    }
    Ok(())
}
