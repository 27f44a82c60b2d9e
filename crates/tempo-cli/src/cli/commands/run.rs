//! `tempo run` – recover, then run unfinished jobs with progress output.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tempo_core::config::TempoConfig;
use tempo_core::control::JobControl;
use tempo_core::fetch::HttpClientFactory;
use tempo_core::ledger::Ledger;
use tempo_core::model::JobId;
use tempo_core::recovery::recover;
use tempo_core::scheduler::{run_job, Engine, JobReport, ProgressStats, RunOptions};

use super::open_cache;
use crate::cli::control_socket;

const PROGRESS_INTERVAL_MS: u128 = 500;

fn build_engine(ledger: &Ledger, cfg: &TempoConfig) -> Result<Engine> {
    Ok(Engine {
        ledger: ledger.clone(),
        cache: open_cache(cfg)?,
        clients: Arc::new(HttpClientFactory::new(&cfg.endpoint, cfg.fetch_timeout())?),
        retry: cfg.retry_policy(),
        fetch_timeout: cfg.fetch_timeout(),
    })
}

fn format_progress(stats: &ProgressStats) -> String {
    let eta = stats
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    format!(
        "  job {}: {}/{} days ({:.0}%)  failed {}  fetches {}  cache hits {}  ETA {}",
        stats.job_id,
        stats.settled(),
        stats.total,
        stats.fraction() * 100.0,
        stats.failed,
        stats.fetch_calls,
        stats.cache_hits,
        eta
    )
}

fn print_report(report: &JobReport) {
    println!(
        "Job {}: {} ({} done, {} failed, {} pending of {}; {} fetches){}",
        report.job_id,
        report.status,
        report.done,
        report.failed,
        report.pending,
        report.total,
        report.fetch_calls,
        if report.cancelled { " [cancelled]" } else { "" }
    );
}

pub async fn run_jobs(
    ledger: &Ledger,
    cfg: &TempoConfig,
    id: Option<JobId>,
    workers: Option<usize>,
) -> Result<()> {
    let engine = build_engine(ledger, cfg)?;

    for r in recover(ledger, &engine.cache).await? {
        if r.stats.reset > 0 || r.stats.promoted > 0 {
            tracing::info!(
                job_id = r.job_id,
                reset = r.stats.reset,
                promoted = r.stats.promoted,
                "recovered job from previous run"
            );
        }
    }

    let ids = match id {
        Some(id) => vec![id],
        None => ledger.list_unfinished_jobs().await?,
    };
    if ids.is_empty() {
        println!("No unfinished jobs.");
        return Ok(());
    }

    let job_control = Arc::new(JobControl::new());
    if let Ok(socket_path) = tempo_core::control::default_control_socket_path() {
        match control_socket::spawn_control_listener(Arc::clone(&job_control), &socket_path) {
            Ok(_) => tracing::debug!(path = %socket_path.display(), "control socket listening"),
            Err(e) => tracing::warn!(path = %socket_path.display(), "control socket bind: {}", e),
        }
    }
    {
        let control = Arc::clone(&job_control);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling; unfinished days stay pending.");
                control.cancel_all();
            }
        });
    }

    for id in ids {
        let cancel = job_control.register(id);
        if cancel.is_cancelled() {
            job_control.unregister(id);
            break;
        }

        let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<ProgressStats>(16);
        let progress_handle = tokio::spawn(async move {
            let mut last_print = Instant::now();
            while let Some(stats) = progress_rx.recv().await {
                let now = Instant::now();
                if now.duration_since(last_print).as_millis() >= PROGRESS_INTERVAL_MS
                    || stats.settled() == stats.total
                {
                    println!("{}", format_progress(&stats));
                    last_print = now;
                }
            }
        });

        let options = RunOptions {
            workers,
            progress_tx: Some(progress_tx),
        };
        let result = run_job(&engine, id, options, cancel).await;
        job_control.unregister(id);
        let _ = progress_handle.await;

        let report = result?;
        print_report(&report);
        if report.cancelled {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_line_shows_counts() {
        let stats = ProgressStats {
            job_id: 3,
            total: 4,
            done: 1,
            failed: 1,
            resumed: 0,
            cache_hits: 1,
            fetch_calls: 2,
            elapsed_secs: 10.0,
        };
        let line = format_progress(&stats);
        assert!(line.contains("job 3: 2/4 days (50%)"), "{line}");
        assert!(line.contains("fetches 2"));
    }
}
