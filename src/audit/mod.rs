//! Structured audit logging for scan jobs.
//!
//! This module provides functions for emitting structured audit events
//! using the `tracing` crate under the `subscout::audit` target. Events can
//! be captured by any tracing subscriber (JSON file, OpenTelemetry, etc.).

mod events;

pub use events::{
    emit_export, emit_job_created, emit_job_evicted, emit_job_finished, emit_job_started,
    emit_stage_entered, AuditEvent, JobAuditEvent,
};
