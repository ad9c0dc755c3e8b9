//! The export adapter: deterministic renderings of a finished scan.
//!
//! Exports are built from the terminal snapshot and stamped with the job's
//! completion time, so exporting the same job twice yields the same bytes.

pub mod json;
pub mod text;

pub use json::JsonRenderer;
pub use text::TextRenderer;

use crate::core::{EngineError, EngineResult, JobId, ResultRecord};
use crate::job::JobSnapshot;
use crate::manager::JobRegistry;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Human-readable text with a commented header.
    Text,
    /// Pretty-printed JSON document.
    Json,
}

impl ExportFormat {
    /// File extension, also the token accepted by [`FromStr`].
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
        }
    }

    fn renderer(&self) -> &'static dyn ExportRenderer {
        match self {
            Self::Text => &TextRenderer,
            Self::Json => &JsonRenderer,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(EngineError::invalid_input(format!(
                "unsupported export format: {other}"
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The data every rendering is produced from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportDocument {
    /// Target domain.
    pub domain: String,
    /// Job identifier.
    pub scan_id: JobId,
    /// When the job finished.
    pub generated_at: DateTime<Utc>,
    /// Number of subdomains.
    pub count: usize,
    /// Records in first-seen order.
    pub subdomains: Vec<ResultRecord>,
}

impl ExportDocument {
    /// Builds a document from a terminal snapshot.
    pub fn from_snapshot(snapshot: JobSnapshot) -> EngineResult<Self> {
        if !snapshot.is_terminal() {
            return Err(EngineError::NotReady {
                id: snapshot.id.to_string(),
                state: snapshot.state,
            });
        }
        Ok(Self {
            domain: snapshot.domain,
            scan_id: snapshot.id,
            generated_at: snapshot.completed_at.unwrap_or(snapshot.created_at),
            count: snapshot.results.len(),
            subdomains: snapshot.results,
        })
    }
}

/// Renders an [`ExportDocument`] into bytes.
pub trait ExportRenderer: Send + Sync {
    /// MIME type of the rendering.
    fn content_type(&self) -> &'static str;

    /// Renders the document.
    fn render(&self, document: &ExportDocument) -> EngineResult<Vec<u8>>;
}

/// A rendered export, ready to be sent as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    /// MIME type.
    pub content_type: &'static str,
    /// Suggested file name.
    pub filename: String,
    /// Rendered bytes.
    pub body: Vec<u8>,
}

/// Renders a snapshot in `format`. Fails with `NotReady` unless the
/// snapshot is terminal.
pub fn render_snapshot(snapshot: JobSnapshot, format: ExportFormat) -> EngineResult<ExportArtifact> {
    let document = ExportDocument::from_snapshot(snapshot)?;
    let renderer = format.renderer();
    Ok(ExportArtifact {
        content_type: renderer.content_type(),
        filename: format!("subdomains_{}.{}", document.domain, format.extension()),
        body: renderer.render(&document)?,
    })
}

/// Exports job `id` in `format`.
///
/// Fails with `NotFound` for unknown ids and `NotReady` while the job is
/// pending or running. Never changes the job.
pub fn export(registry: &JobRegistry, id: JobId, format: ExportFormat) -> EngineResult<ExportArtifact> {
    let snapshot = registry.get(id)?;
    let artifact = render_snapshot(snapshot.clone(), format)?;
    crate::audit::emit_export(&snapshot, &artifact);
    Ok(artifact)
}
