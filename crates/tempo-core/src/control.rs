//! Job control for cancellation: shared cancel tokens per running job.
//!
//! The CLI registers each job it runs; a control client (`tempo cancel 3` via
//! the control socket, or Ctrl-C) cancels the token and the scheduler stops
//! claiming days, reverting in-flight ones to Pending.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use tokio_util::sync::CancellationToken;

use crate::model::JobId;

/// Shared registry of job id -> cancel token.
#[derive(Default)]
pub struct JobControl {
    root: CancellationToken,
    jobs: RwLock<HashMap<JobId, CancellationToken>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a running job; returns the token to pass to `run_job`.
    /// Tokens are children of a root so [`cancel_all`](Self::cancel_all) reaches every job.
    pub fn register(&self, job_id: JobId) -> CancellationToken {
        let token = self.root.child_token();
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job_id, token.clone());
        token
    }

    /// Unregister a job (call when the run returns, success or failure).
    pub fn unregister(&self, job_id: JobId) {
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&job_id);
    }

    /// Cancel one job. Returns false if it is not running here.
    pub fn request_cancel(&self, job_id: JobId) -> bool {
        match self
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&job_id)
        {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered job and any registered later.
    pub fn cancel_all(&self) {
        self.root.cancel();
    }

    pub fn running(&self) -> Vec<JobId> {
        let mut ids: Vec<_> = self
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Default path for the control socket (same XDG state dir as the ledger).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tempo")?;
    xdg_dirs.place_state_file("control.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_reaches_only_target_job() {
        let ctl = JobControl::new();
        let a = ctl.register(1);
        let b = ctl.register(2);
        assert_eq!(ctl.running(), vec![1, 2]);
        assert!(ctl.request_cancel(1));
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!ctl.request_cancel(9));
        ctl.unregister(1);
        assert_eq!(ctl.running(), vec![2]);
    }

    #[test]
    fn cancel_all_reaches_everything() {
        let ctl = JobControl::new();
        let a = ctl.register(1);
        ctl.cancel_all();
        assert!(a.is_cancelled());
        assert!(ctl.register(2).is_cancelled());
    }
}
