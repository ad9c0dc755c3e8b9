//! A candidate source backed by a fixed list of names.

use crate::core::{CandidateSource, SourceError, SourceKind};

use async_trait::async_trait;

/// Returns the same candidate names for every domain.
///
/// Useful for seeding a scan with names already known from elsewhere.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    kind: SourceKind,
    names: Vec<String>,
}

impl StaticSource {
    /// Creates a passive source named `"static"`.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "static".to_string(),
            kind: SourceKind::Passive,
            names: names.into_iter().map(Into::into).collect(),
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
}

#[async_trait]
impl CandidateSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn candidates(&self, _domain: &str) -> Result<Vec<String>, SourceError> {
        Ok(self.names.clone())
    }
}
