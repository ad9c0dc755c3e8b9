//! Error types for the subscout engine.
//!
//! Errors are split by blast radius. [`ProbeError`] and [`SourceError`]
//! describe failures of a single collaborator call and are absorbed by the
//! orchestrator; [`EngineError`] is what callers of the registry, poll and
//! export operations see.

use crate::core::types::JobState;

use std::time::Duration;
use thiserror::Error;

/// The main error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The submitted input (usually the domain) is empty or malformed.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What is wrong with the input.
        reason: String,
    },

    /// No job with this identifier is known to the registry.
    #[error("scan not found: {id}")]
    NotFound {
        /// The identifier that was looked up.
        id: String,
    },

    /// The job exists but has not reached a terminal state yet.
    #[error("scan {id} is not finished yet (state: {state})")]
    NotReady {
        /// The job identifier.
        id: String,
        /// The state the job was in when the request was made.
        state: JobState,
    },

    /// The registry refuses new jobs until running ones finish.
    #[error("too many active scans (limit {limit})")]
    CapacityExceeded {
        /// Configured maximum of concurrently active jobs.
        limit: usize,
    },

    /// The orchestration layer itself failed (e.g. every candidate source errored).
    #[error("scan failed: {reason}")]
    Orchestration {
        /// Human-readable cause.
        reason: String,
    },

    /// The job ran past its configured deadline.
    #[error("scan deadline of {elapsed:?} exceeded")]
    DeadlineExceeded {
        /// The deadline that elapsed.
        elapsed: Duration,
    },

    /// The job was cancelled before it could complete.
    #[error("scan was cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// Rendering a payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl EngineError {
    /// Returns `true` if this error terminates a job (drives it to `Failed`).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Orchestration { .. }
                | Self::DeadlineExceeded { .. }
                | Self::Cancelled
                | Self::Internal { .. }
        )
    }

    /// Returns `true` if the error was caused by the caller's request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::NotFound { .. } | Self::NotReady { .. }
        )
    }

    /// Creates an `InvalidInput` error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Creates a `NotFound` error.
    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// Creates an `Orchestration` error.
    pub fn orchestration(reason: impl Into<String>) -> Self {
        Self::Orchestration {
            reason: reason.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Failure of a single probe against a single subdomain.
///
/// Never fatal for the job: the orchestrator logs it and leaves the
/// corresponding record fields absent.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// The probe did not answer within its time budget.
    #[error("probe '{probe}' timed out after {elapsed:?}")]
    Timeout {
        /// Name of the probe.
        probe: String,
        /// The time budget that elapsed.
        elapsed: Duration,
    },

    /// Name resolution failed.
    #[error("could not resolve {subdomain}: {message}")]
    Resolution {
        /// The name that failed to resolve.
        subdomain: String,
        /// Resolver message.
        message: String,
    },

    /// A connection could not be established or was reset.
    #[error("connection to {target} failed: {message}")]
    Connection {
        /// URL or host that was contacted.
        target: String,
        /// Transport message.
        message: String,
    },

    /// The job was cancelled while the probe was in flight.
    #[error("probe cancelled")]
    Cancelled,

    /// Any other probe-specific failure.
    #[error("{message}")]
    Other {
        /// Failure description.
        message: String,
    },
}

impl ProbeError {
    /// Creates a `Timeout` error.
    pub fn timeout(probe: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            probe: probe.into(),
            elapsed,
        }
    }

    /// Creates a `Connection` error.
    pub fn connection(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates an `Other` error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// Failure of a candidate source (passive lookup or brute force).
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The upstream service could not be reached or refused the request.
    #[error("source '{source_name}' is unavailable: {reason}")]
    Unavailable {
        /// Name of the source.
        source_name: String,
        /// Why it is unavailable.
        reason: String,
    },

    /// The source did not answer in time.
    #[error("source '{source_name}' timed out after {elapsed:?}")]
    Timeout {
        /// Name of the source.
        source_name: String,
        /// The time budget that elapsed.
        elapsed: Duration,
    },

    /// The upstream service is throttling us.
    #[error("source '{source_name}' rate limited")]
    RateLimited {
        /// Name of the source.
        source_name: String,
    },

    /// The upstream answered with something we could not parse.
    #[error("source '{source_name}' returned an invalid response: {details}")]
    InvalidResponse {
        /// Name of the source.
        source_name: String,
        /// What was wrong with it.
        details: String,
    },
}

impl SourceError {
    /// Returns `true` if the call is worth retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }

    /// Returns the name of the source that failed.
    pub fn source_name(&self) -> &str {
        match self {
            Self::Unavailable { source_name, .. }
            | Self::Timeout { source_name, .. }
            | Self::RateLimited { source_name }
            | Self::InvalidResponse { source_name, .. } => source_name,
        }
    }

    /// Creates an `Unavailable` error.
    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidResponse` error.
    pub fn invalid_response(source_name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidResponse {
            source_name: source_name.into(),
            details: details.into(),
        }
    }
}

/// A specialized `Result` type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
