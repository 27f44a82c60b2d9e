//! Job parameters: region, product selection, quality filters, day enumeration.

mod job;
mod product;
mod region;

pub use job::{
    clamp_workers, hour_range, AuthMode, JobId, JobRequest, JobRequestError, JobStatus, Weekdays,
    MAX_WORKERS,
};
pub use product::{Product, ProductSelection, QualityFilters, QualityTier, SelectionError};
pub use region::{Region, RegionError};
