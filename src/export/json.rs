//! JSON export format.

use crate::core::EngineResult;
use crate::export::{ExportDocument, ExportRenderer};

/// Renders the export document as pretty-printed JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl ExportRenderer for JsonRenderer {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn render(&self, document: &ExportDocument) -> EngineResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(document)?)
    }
}
