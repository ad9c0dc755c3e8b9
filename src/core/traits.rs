//! Collaborator traits for the subscout engine.
//!
//! The engine never discovers or probes anything itself. Candidate names
//! come from [`CandidateSource`] implementations, and per-subdomain facts
//! come from [`Probe`] implementations. Both are plugged into a
//! [`JobRegistry`](crate::manager::JobRegistry) through its builder.

use crate::core::error::{ProbeError, SourceError};
use crate::core::record::ResultRecord;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Whether a source is consulted unconditionally or only as a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Cheap lookups (certificate transparency, passive DNS). Always run.
    Passive,
    /// Expensive enumeration (wordlist brute force). Runs only when the
    /// passive sources found fewer candidates than the configured threshold.
    Active,
}

/// A provider of candidate subdomain names for a domain.
///
/// # Implementation Notes
///
/// - Returned names may be unnormalized and may include names outside the
///   domain; the orchestrator filters and de-duplicates them.
/// - Implementations should never panic; return a `SourceError` instead.
///   A failing source is skipped unless every source fails.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use subscout::core::{CandidateSource, SourceError};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct ZoneFileSource {
///     names: Vec<String>,
/// }
///
/// #[async_trait]
/// impl CandidateSource for ZoneFileSource {
///     fn name(&self) -> &str {
///         "zonefile"
///     }
///
///     async fn candidates(&self, _domain: &str) -> Result<Vec<String>, SourceError> {
///         Ok(self.names.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait CandidateSource: Send + Sync + Debug {
    /// Stable, human-readable identifier such as `"crtsh"`.
    fn name(&self) -> &str;

    /// Whether this source is passive or active.
    fn kind(&self) -> SourceKind {
        SourceKind::Passive
    }

    /// Returns candidate names for `domain`.
    ///
    /// # Errors
    ///
    /// - `Unavailable` - The upstream could not be reached.
    /// - `Timeout` - The upstream did not answer in time.
    /// - `RateLimited` - The upstream is throttling requests.
    /// - `InvalidResponse` - The answer could not be parsed.
    async fn candidates(&self, domain: &str) -> Result<Vec<String>, SourceError>;
}

/// Which part of the pipeline a probe belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbePhase {
    /// Resolution and HTTP(S) checks.
    Probing,
    /// Heuristics that read what the probing phase found.
    Classification,
}

/// The input handed to a probe.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    /// The normalized subdomain to check.
    pub subdomain: String,
    /// The merged record as stored when this probe was dispatched.
    pub known: ResultRecord,
}

impl ProbeTarget {
    /// Creates a target with nothing known yet.
    pub fn new(subdomain: impl AsRef<str>) -> Self {
        let known = ResultRecord::new(subdomain);
        Self {
            subdomain: known.subdomain.clone(),
            known,
        }
    }

    /// Creates a target from an existing record.
    pub fn from_record(known: ResultRecord) -> Self {
        Self {
            subdomain: known.subdomain.clone(),
            known,
        }
    }
}

/// A unit of work that inspects one subdomain.
///
/// # Implementation Notes
///
/// - Return `Ok(Some(record))` with only the fields this probe is
///   responsible for; everything else should stay absent so the merge
///   does not clobber other probes' findings.
/// - Return `Ok(None)` when there is nothing to report.
/// - Errors are per-subdomain and never fail the job.
#[async_trait]
pub trait Probe: Send + Sync + Debug {
    /// Stable, human-readable identifier such as `"dns"` or `"https"`.
    fn name(&self) -> &str;

    /// The phase this probe runs in.
    fn phase(&self) -> ProbePhase {
        ProbePhase::Probing
    }

    /// Inspects a single subdomain.
    async fn probe(&self, target: &ProbeTarget) -> Result<Option<ResultRecord>, ProbeError>;
}

/// An arc-wrapped candidate source for shared ownership.
pub type ArcSource = Arc<dyn CandidateSource>;

/// An arc-wrapped probe for shared ownership.
pub type ArcProbe = Arc<dyn Probe>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_target_normalizes() {
        let target = ProbeTarget::new("Mail.Example.com");
        assert_eq!(target.subdomain, "mail.example.com");
        assert_eq!(target.known.subdomain, "mail.example.com");
        assert!(target.known.is_bare());
    }

    #[test]
    fn test_probe_target_from_record() {
        let record = ResultRecord::new("www.example.com").with_http_status(200);
        let target = ProbeTarget::from_record(record.clone());
        assert_eq!(target.subdomain, "www.example.com");
        assert_eq!(target.known, record);
    }
}
