//! Day-task scheduler.
//!
//! Runs one job's day tasks on a bounded pool of workers sharing a claim queue:
//! cache probe → fetch (blocking pool, per-attempt timeout) → split → publish.
//! Every transition is persisted to the ledger before the work it announces.

mod day;
mod guard;
mod progress;
mod queue;
mod run;
mod worker;

pub use progress::{ProgressEvent, ProgressStats, ProgressTracker};
pub use run::{run_job, Engine, JobFatal, JobReport, RunOptions};
