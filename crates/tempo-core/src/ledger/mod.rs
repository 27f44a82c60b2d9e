//! Persistent job ledger (SQLite via sqlx).
//!
//! Stores jobs and their day tasks. Every day-task transition is written here
//! before the work it announces starts, so the ledger never claims more
//! progress than actually happened.

mod db;
mod jobs;
mod tasks;
mod types;

pub use db::Ledger;
pub use types::{JobRecord, JobSummary};

#[cfg(test)]
pub(crate) use db::open_memory;

#[cfg(test)]
mod tests;
