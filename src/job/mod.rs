//! Scan jobs: lifecycle, progress and snapshots.
//!
//! A [`ScanJob`] is passive state. It is driven by a
//! [`ScanPipeline`](crate::manager::ScanPipeline) and read by pollers
//! through [`JobSnapshot`]s.

mod candidates;
mod progress;
mod scan_job;

pub use candidates::CandidateSet;
pub use progress::{ProgressTracker, StageWeights, MAX_RUNNING_PROGRESS};
pub use scan_job::{JobSnapshot, ScanJob};
