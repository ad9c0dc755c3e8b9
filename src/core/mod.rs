//! Core types and traits for the subscout engine.
//!
//! - [`types`] - Job identifiers, states, stages and domain validation
//! - [`record`] - The per-subdomain `ResultRecord` and its merge rules
//! - [`traits`] - The `CandidateSource` and `Probe` collaborator traits
//! - [`error`] - Structured error types

pub mod error;
pub mod record;
pub mod traits;
pub mod types;

pub use error::{EngineError, EngineResult, ProbeError, SourceError};
pub use record::ResultRecord;
pub use traits::{
    ArcProbe, ArcSource, CandidateSource, Probe, ProbePhase, ProbeTarget, SourceKind,
};
pub use types::{
    is_subdomain_of, is_valid_hostname, normalize_domain, normalize_name, CloudflareState, JobId,
    JobState, Stage,
};
