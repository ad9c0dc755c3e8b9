//! Core types used throughout the subscout engine.
//!
//! This module defines job identifiers, job states and stages, the
//! Cloudflare classification and the domain-name validation shared by
//! submission and candidate filtering.

use crate::core::error::{EngineError, EngineResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum length of a fully-qualified domain name.
const MAX_NAME_LEN: usize = 253;

/// Maximum length of a single label.
const MAX_LABEL_LEN: usize = 63;

/// Opaque identifier of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for JobId {
    type Err = EngineError;

    /// Parses a job identifier. Anything that is not a UUID cannot name a
    /// job, so it is reported as `NotFound` rather than as bad input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| EngineError::not_found(s))
    }
}

/// Lifecycle state of a scan job.
///
/// ```text
/// Pending -> Running -> Completed
///                   \-> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, enumeration has not started yet.
    Pending,
    /// Enumeration or probing in progress.
    Running,
    /// All probes returned and progress reached 100.
    Completed,
    /// The orchestration layer gave up; partial results are kept.
    Failed,
}

impl JobState {
    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns `true` if `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Processing phase of a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Job accepted, nothing dispatched yet.
    Starting,
    /// Querying passive candidate sources.
    PassiveEnumeration,
    /// Running active candidate sources such as wordlist brute force.
    ActiveEnumeration,
    /// Running resolution and HTTP(S) probes.
    Probing,
    /// Running edge-protection classifiers.
    Classification,
    /// Job reached a terminal state.
    Finished,
}

impl Stage {
    /// Short status token exposed to pollers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::PassiveEnumeration => "passive_enumeration",
            Self::ActiveEnumeration => "active_enumeration",
            Self::Probing => "probing",
            Self::Classification => "classification",
            Self::Finished => "completed",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Starting => "Starting scan",
            Self::PassiveEnumeration => "Enumerating passive sources",
            Self::ActiveEnumeration => "Brute-forcing candidates",
            Self::Probing => "Probing hosts",
            Self::Classification => "Classifying edge protection",
            Self::Finished => "Finished",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a host sits behind Cloudflare.
///
/// `Unknown` is the absent value: merging never lets it overwrite a
/// definite answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloudflareState {
    /// Cloudflare markers were observed.
    Enabled,
    /// The host answered without Cloudflare markers.
    Disabled,
    /// Not determined.
    #[default]
    Unknown,
}

impl CloudflareState {
    /// Returns `true` unless the state is `Unknown`.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for CloudflareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => write!(f, "Enabled"),
            Self::Disabled => write!(f, "Disabled"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Normalizes a submitted domain and validates it.
///
/// Trims whitespace, lowercases and strips a trailing dot. Fails with
/// `InvalidInput` if the result is empty or not a valid hostname with at
/// least two labels.
pub fn normalize_domain(input: &str) -> EngineResult<String> {
    let name = normalize_name(input);
    if name.is_empty() {
        return Err(EngineError::invalid_input("Domain is required"));
    }
    if !name.contains('.') {
        return Err(EngineError::invalid_input(format!(
            "'{name}' is not a fully-qualified domain"
        )));
    }
    if !is_valid_hostname(&name) {
        return Err(EngineError::invalid_input(format!(
            "'{name}' is not a valid domain name"
        )));
    }
    Ok(name)
}

/// Trims, lowercases and strips one trailing dot.
pub fn normalize_name(input: &str) -> String {
    let trimmed = input.trim();
    trimmed
        .strip_suffix('.')
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

/// Checks LDH hostname syntax (letters, digits, hyphens; underscores are
/// tolerated since they appear in real DNS names).
pub fn is_valid_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    })
}

/// Returns `true` if `candidate` is a proper subdomain of `domain`.
///
/// Both arguments are expected to be normalized already.
pub fn is_subdomain_of(candidate: &str, domain: &str) -> bool {
    candidate.len() > domain.len() + 1
        && candidate.ends_with(domain)
        && candidate.as_bytes()[candidate.len() - domain.len() - 1] == b'.'
}
