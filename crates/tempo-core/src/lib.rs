//! Core engine for tempo: turns a region + date range + product selection into
//! a resumable, parallel fetch-and-split pipeline of per-hour artifacts.

pub mod config;
pub mod logging;

pub mod batch;
pub mod cache;
pub mod control;
pub mod fetch;
pub mod ledger;
pub mod model;
pub mod recovery;
pub mod retry;
pub mod scheduler;
pub mod splitter;
pub mod task;
