//! Mock sources and probes for testing.
//!
//! This module provides configurable mocks that can be used in tests to
//! simulate upstream answers, latency and failures without touching the
//! network.

use crate::core::{
    CandidateSource, Probe, ProbeError, ProbePhase, ProbeTarget, ResultRecord, SourceError,
    SourceKind,
};

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Deterministic "randomness" based on the call count.
fn should_fail(fail_rate: f32, count: u64) -> bool {
    if fail_rate <= 0.0 {
        return false;
    }
    if fail_rate >= 1.0 {
        return true;
    }
    (count as f32 * 0.618033988749895) % 1.0 < fail_rate
}

/// A mock candidate source.
///
/// # Examples
///
/// ```rust
/// use subscout::backends::MockSource;
/// use subscout::core::SourceError;
/// use std::time::Duration;
///
/// // A source that always answers with the same names
/// let source = MockSource::new(["www.example.com", "api.example.com"])
///     .with_latency(Duration::from_millis(50));
///
/// // A source that is always down
/// let source = MockSource::failing(SourceError::unavailable("mock", "connection refused"));
/// ```
#[derive(Debug)]
pub struct MockSource {
    name: String,
    kind: SourceKind,
    names: Vec<String>,
    error: Option<SourceError>,
    latency: Option<Duration>,
    fail_rate: f32,
    call_count: AtomicU64,
}

impl MockSource {
    /// Creates a passive source that returns `names` for every domain.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "mock".to_string(),
            kind: SourceKind::Passive,
            names: names.into_iter().map(Into::into).collect(),
            error: None,
            latency: None,
            fail_rate: 0.0,
            call_count: AtomicU64::new(0),
        }
    }

    /// Creates a source that always returns `error`.
    pub fn failing(error: SourceError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(Vec::<String>::new())
        }
    }

    /// Sets the name of this source.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets whether this source is passive or active.
    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the simulated latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Sets the probability of a recoverable failure.
    pub fn with_fail_rate(mut self, rate: f32) -> Self {
        self.fail_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Returns the number of calls made.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CandidateSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn candidates(&self, _domain: &str) -> Result<Vec<String>, SourceError> {
        let count = self.call_count.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if should_fail(self.fail_rate, count) {
            return Err(SourceError::unavailable(&self.name, "simulated failure"));
        }

        Ok(self.names.clone())
    }
}

/// A mock probe.
///
/// Reports a configured record per subdomain, or a default record for
/// every other subdomain. Records are re-keyed to the probed subdomain, so
/// the default can be built with an empty name.
///
/// # Examples
///
/// ```rust
/// use subscout::backends::MockProbe;
/// use subscout::core::ResultRecord;
///
/// let probe = MockProbe::new()
///     .with_name("https")
///     .with_default_record(ResultRecord::new("").with_https_status(200))
///     .with_response("admin.example.com", ResultRecord::new("admin.example.com").with_https_status(403))
///     .failing_on("broken.example.com");
/// ```
#[derive(Debug)]
pub struct MockProbe {
    name: String,
    phase: ProbePhase,
    responses: HashMap<String, ResultRecord>,
    default_record: Option<ResultRecord>,
    failing: HashSet<String>,
    latency: Option<Duration>,
    fail_rate: f32,
    call_count: AtomicU64,
}

impl MockProbe {
    /// Creates a probe that reports nothing.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            phase: ProbePhase::Probing,
            responses: HashMap::new(),
            default_record: None,
            failing: HashSet::new(),
            latency: None,
            fail_rate: 0.0,
            call_count: AtomicU64::new(0),
        }
    }

    /// Sets the name of this probe.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the phase this probe runs in.
    pub fn with_phase(mut self, phase: ProbePhase) -> Self {
        self.phase = phase;
        self
    }

    /// Sets the record reported for subdomains without a specific response.
    pub fn with_default_record(mut self, record: ResultRecord) -> Self {
        self.default_record = Some(record);
        self
    }

    /// Adds a response for a specific subdomain.
    pub fn with_response(mut self, subdomain: impl AsRef<str>, record: ResultRecord) -> Self {
        self.responses
            .insert(crate::core::normalize_name(subdomain.as_ref()), record);
        self
    }

    /// Makes the probe fail for a specific subdomain.
    pub fn failing_on(mut self, subdomain: impl AsRef<str>) -> Self {
        self.failing
            .insert(crate::core::normalize_name(subdomain.as_ref()));
        self
    }

    /// Sets the simulated latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Sets the probability of failure.
    pub fn with_fail_rate(mut self, rate: f32) -> Self {
        self.fail_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Returns the number of probes performed.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }
}

impl Default for MockProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for MockProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn phase(&self) -> ProbePhase {
        self.phase
    }

    async fn probe(&self, target: &ProbeTarget) -> Result<Option<ResultRecord>, ProbeError> {
        let count = self.call_count.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.contains(&target.subdomain) || should_fail(self.fail_rate, count) {
            return Err(ProbeError::connection(&target.subdomain, "simulated failure"));
        }

        let record = self
            .responses
            .get(&target.subdomain)
            .or(self.default_record.as_ref())
            .cloned()
            .map(|mut record| {
                record.subdomain = target.subdomain.clone();
                record
            });

        Ok(record)
    }
}
