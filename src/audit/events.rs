//! Audit event types and emission functions.

use crate::core::{JobId, JobState, Stage};
use crate::export::ExportArtifact;
use crate::job::{JobSnapshot, ScanJob};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Audit event for a job reaching a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAuditEvent {
    /// Event type.
    pub event_type: String,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Job identifier.
    pub scan_id: String,

    /// Target domain.
    pub domain: String,

    /// Terminal state.
    pub state: JobState,

    /// Stage the job was in when it terminated.
    pub stage: String,

    /// Progress at termination.
    pub progress: u8,

    /// Number of subdomains found.
    pub result_count: usize,

    /// Number of subdomains that answered HTTP(S).
    pub active_count: usize,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: Option<i64>,

    /// Failure description, if failed.
    pub error: Option<String>,
}

impl From<&JobSnapshot> for JobAuditEvent {
    fn from(snapshot: &JobSnapshot) -> Self {
        let event_type = match snapshot.state {
            JobState::Failed => "job_failed",
            _ => "job_completed",
        };
        Self {
            event_type: event_type.to_string(),
            timestamp: snapshot.completed_at.unwrap_or_else(Utc::now),
            scan_id: snapshot.id.to_string(),
            domain: snapshot.domain.clone(),
            state: snapshot.state,
            stage: snapshot.stage.as_str().to_string(),
            progress: snapshot.progress,
            result_count: snapshot.results.len(),
            active_count: snapshot.active_count(),
            duration_ms: snapshot.duration().map(|d| d.num_milliseconds()),
            error: snapshot.error.clone(),
        }
    }
}

impl AuditEvent for JobAuditEvent {
    fn event_type(&self) -> &'static str {
        match self.state {
            JobState::Failed => "job_failed",
            _ => "job_completed",
        }
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Emits an audit event for a job being registered.
pub fn emit_job_created(job: &ScanJob) {
    tracing::info!(
        target: "subscout::audit",
        event_type = "job_created",
        scan_id = %job.id(),
        domain = %job.domain(),
        "Scan created"
    );
}

/// Emits an audit event for a job starting enumeration.
pub fn emit_job_started(job: &ScanJob) {
    tracing::info!(
        target: "subscout::audit",
        event_type = "job_started",
        scan_id = %job.id(),
        domain = %job.domain(),
        "Scan started"
    );
}

/// Emits an event for a job entering a stage.
pub fn emit_stage_entered(job: &ScanJob, stage: Stage, units: u64) {
    tracing::debug!(
        target: "subscout::audit",
        event_type = "stage_entered",
        scan_id = %job.id(),
        stage = stage.as_str(),
        units = units,
        progress = job.progress(),
        "Scan stage entered"
    );
}

/// Emits an audit event for a job reaching a terminal state.
pub fn emit_job_finished(snapshot: &JobSnapshot) {
    let event = JobAuditEvent::from(snapshot);

    tracing::info!(
        target: "subscout::audit",
        event_type = event.event_type(),
        scan_id = %event.scan_id,
        domain = %event.domain,
        state = %event.state,
        stage = %event.stage,
        progress = event.progress,
        result_count = event.result_count,
        active_count = event.active_count,
        duration_ms = ?event.duration_ms,
        error = ?event.error,
        "Scan finished"
    );
}

/// Emits an audit event for a terminal job being dropped from the registry.
pub fn emit_job_evicted(id: JobId, domain: &str) {
    tracing::info!(
        target: "subscout::audit",
        event_type = "job_evicted",
        scan_id = %id,
        domain = %domain,
        "Scan evicted"
    );
}

/// Emits an audit event for an export being produced.
pub fn emit_export(snapshot: &JobSnapshot, artifact: &ExportArtifact) {
    tracing::info!(
        target: "subscout::audit",
        event_type = "job_exported",
        scan_id = %snapshot.id,
        domain = %snapshot.domain,
        content_type = artifact.content_type,
        filename = %artifact.filename,
        bytes = artifact.body.len(),
        count = snapshot.results.len(),
        "Scan exported"
    );
}
