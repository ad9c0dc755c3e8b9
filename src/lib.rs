//! # Subscout
//!
//! Subdomain scan job orchestration: pluggable candidate sources and
//! probes, a concurrent per-job result store, pollable jobs and
//! deterministic exports.
//!
//! ## Overview
//!
//! A client submits a domain and gets a scan id back immediately. The
//! scan then runs in the background:
//!
//! - Candidate names are collected from passive sources, and from active
//!   sources (wordlist brute force) if the passive ones found too few
//! - Every candidate is probed with bounded concurrency; each probe fills
//!   in the fields it is responsible for and the store merges them
//! - Classifiers run last and read what the probes found
//! - Pollers see progress, the current stage and the partial results
//! - Once terminal, the results can be exported as text or JSON
//!
//! A failing probe only leaves fields empty. A scan fails only when the
//! orchestration itself gives up: every source failed, the deadline
//! passed or the scan was cancelled.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use subscout::backends::{DnsProbe, ServerHeaderClassifier, WordlistSource};
//! use subscout::{export, poll, ExportFormat, JobRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = JobRegistry::builder()
//!         .add_source(WordlistSource::default())
//!         .add_probe(DnsProbe::new())
//!         .add_probe(ServerHeaderClassifier::new())
//!         .build()?;
//!
//!     let id = registry.create("example.com")?;
//!     while !poll(&registry, id)?.is_terminal() {
//!         tokio::time::sleep(std::time::Duration::from_millis(500)).await;
//!     }
//!
//!     let artifact = export(&registry, id, ExportFormat::Json)?;
//!     println!("{}", String::from_utf8_lossy(&artifact.body));
//!
//!     registry.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `http` - HTTP(S) probing and the crt.sh source via `reqwest`
//! - `server` - The axum router and the `subscout-server` binary
//!
//! ## Architecture
//!
//! - **Core**: Identifiers, states, records, errors and collaborator traits
//! - **Store**: The per-job concurrent result store
//! - **Job**: The job state machine, progress and snapshots
//! - **Manager**: The job registry and the scan pipeline
//! - **Poll** / **Export**: What clients see
//! - **Backends**: Built-in sources and probes
//! - **Audit**: Structured lifecycle events

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod backends;
pub mod core;
pub mod export;
pub mod job;
pub mod manager;
pub mod poll;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types at the crate root
pub use crate::core::{
    CandidateSource, CloudflareState, EngineError, EngineResult, JobId, JobState, Probe,
    ProbeError, ProbeTarget, ResultRecord, SourceError, Stage,
};

pub use crate::export::{export, ExportArtifact, ExportFormat};
pub use crate::job::{JobSnapshot, ScanJob};
pub use crate::manager::{JobRegistry, JobRegistryBuilder, PipelineConfig, RegistryConfig};
pub use crate::poll::{poll, PollResponse};
pub use crate::store::ResultStore;

/// Prelude module for convenient imports.
///
/// ```rust
/// use subscout::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        CandidateSource, CloudflareState, EngineError, EngineResult, JobId, JobState, Probe,
        ProbeError, ProbePhase, ProbeTarget, ResultRecord, SourceError, SourceKind, Stage,
    };
    pub use crate::export::{export, ExportArtifact, ExportFormat};
    pub use crate::job::JobSnapshot;
    pub use crate::manager::{JobRegistry, PipelineConfig, RegistryConfig, RetryConfig};
    pub use crate::poll::{poll, PollResponse};
}
