//! Progress reporting for job runs (days settled, ETA).
//!
//! Workers report through [`ProgressTracker::record`]; readers take consistent
//! [`ProgressStats`] snapshots or subscribe to an `mpsc` feed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::model::JobId;

/// What a worker just did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Day satisfied from cache without a fetch.
    CacheHit,
    /// A fetch attempt started.
    FetchStarted,
    /// Day published and marked Done.
    Done,
    /// Day marked Failed.
    Failed,
}

/// Snapshot of one job's progress (CLI-friendly).
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    pub job_id: JobId,
    pub total: usize,
    /// Days Done, including cache hits and days already Done before this run.
    pub done: usize,
    pub failed: usize,
    /// Days that were already terminal when this run started.
    pub resumed: usize,
    pub cache_hits: usize,
    pub fetch_calls: usize,
    /// Elapsed time since the run started (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Done + Failed. Never decreases during a run.
    pub fn settled(&self) -> usize {
        self.done + self.failed
    }

    /// Fraction settled in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.settled() as f64 / self.total as f64).min(1.0)
    }

    /// Estimated seconds remaining from this run's settle rate (None until
    /// something has settled).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total.saturating_sub(self.settled());
        if remaining == 0 {
            return Some(0.0);
        }
        let settled_now = self.settled().saturating_sub(self.resumed);
        if settled_now == 0 || self.elapsed_secs <= 0.0 {
            return None;
        }
        Some(self.elapsed_secs / settled_now as f64 * remaining as f64)
    }
}

/// Shared aggregator. Counters are atomics so `snapshot()` never blocks
/// workers; updates are serialized so every emitted snapshot is consistent.
pub struct ProgressTracker {
    job_id: JobId,
    total: usize,
    resumed: usize,
    done: AtomicUsize,
    failed: AtomicUsize,
    cache_hits: AtomicUsize,
    fetch_calls: AtomicUsize,
    update: Mutex<()>,
    started: Instant,
    tx: Option<mpsc::Sender<ProgressStats>>,
}

impl ProgressTracker {
    pub fn new(
        job_id: JobId,
        total: usize,
        done: usize,
        failed: usize,
        tx: Option<mpsc::Sender<ProgressStats>>,
    ) -> Self {
        Self {
            job_id,
            total,
            resumed: done + failed,
            done: AtomicUsize::new(done),
            failed: AtomicUsize::new(failed),
            cache_hits: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            update: Mutex::new(()),
            started: Instant::now(),
            tx,
        }
    }

    pub fn record(&self, event: ProgressEvent) {
        let _g = self.update.lock().unwrap_or_else(|e| e.into_inner());
        match event {
            ProgressEvent::CacheHit => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                self.done.fetch_add(1, Ordering::Relaxed);
            }
            ProgressEvent::FetchStarted => {
                self.fetch_calls.fetch_add(1, Ordering::Relaxed);
            }
            ProgressEvent::Done => {
                self.done.fetch_add(1, Ordering::Relaxed);
            }
            ProgressEvent::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        if let Some(tx) = &self.tx {
            // Drop updates when the consumer is behind; the next one supersedes it.
            let _ = tx.try_send(self.snapshot());
        }
    }

    pub fn snapshot(&self) -> ProgressStats {
        ProgressStats {
            job_id: self.job_id,
            total: self.total,
            done: self.done.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            resumed: self.resumed,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fetch_calls: self.fetch_calls.load(Ordering::Relaxed),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_fraction() {
        let p = ProgressTracker::new(7, 4, 1, 0, None);
        p.record(ProgressEvent::CacheHit);
        p.record(ProgressEvent::FetchStarted);
        p.record(ProgressEvent::Failed);
        let s = p.snapshot();
        assert_eq!(s.job_id, 7);
        assert_eq!(s.done, 2);
        assert_eq!(s.failed, 1);
        assert_eq!(s.cache_hits, 1);
        assert_eq!(s.fetch_calls, 1);
        assert_eq!(s.settled(), 3);
        assert!((s.fraction() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn eta_uses_this_runs_rate() {
        let s = ProgressStats {
            job_id: 1,
            total: 10,
            done: 6,
            failed: 0,
            resumed: 4,
            cache_hits: 0,
            fetch_calls: 2,
            elapsed_secs: 20.0,
        };
        // 2 settled in 20s, 4 remaining → 40s.
        assert_eq!(s.eta_secs(), Some(40.0));
        let fresh = ProgressStats {
            done: 4,
            elapsed_secs: 1.0,
            ..s.clone()
        };
        assert_eq!(fresh.eta_secs(), None);
    }

    #[tokio::test]
    async fn feed_receives_snapshots() {
        let (tx, mut rx) = mpsc::channel(8);
        let p = ProgressTracker::new(1, 2, 0, 0, Some(tx));
        p.record(ProgressEvent::Done);
        p.record(ProgressEvent::Done);
        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        assert_eq!(a.done, 1);
        assert_eq!(b.done, 2);
        assert_eq!(b.fraction(), 1.0);
    }
}
