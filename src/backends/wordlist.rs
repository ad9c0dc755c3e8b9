//! Active enumeration from a wordlist.

use crate::core::{normalize_name, CandidateSource, EngineError, EngineResult, SourceError, SourceKind};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::Path;

/// Labels tried when no wordlist file is configured.
pub const DEFAULT_WORDLIST: &[&str] = &[
    "www", "mail", "ftp", "localhost", "webmail", "smtp", "secure", "news", "ns1", "ns2", "ns3",
    "ns4", "test", "docs", "api", "admin", "blog", "cloud", "dev", "development", "forum", "help",
    "image", "img", "login", "m", "mobile", "my", "new", "old", "owa", "portal", "proxy", "shop",
    "ssl", "support", "web", "webdisk", "webadmin", "autodiscover", "email", "dashboard", "vpn",
    "wiki", "download", "uploads", "cdn", "static", "assets", "media", "files", "images", "js",
    "css", "cache", "storage", "app", "apps", "application", "demo", "stage", "staging", "prod",
    "production", "testing", "beta", "alpha", "live", "status", "monitor", "monitoring", "stats",
    "statistics", "analytics", "metrics", "db", "database", "sql", "mysql", "postgres", "redis",
    "mongodb", "elastic", "search", "query", "rest", "graphql", "soap", "xml", "json", "rpc",
    "auth", "authentication", "signin", "signup", "register", "account", "user", "users",
    "profile", "profiles", "administrator", "root", "system", "sys", "server", "servers",
    "service", "services", "backend", "frontend", "client", "clients", "customer", "customers",
    "partner", "partners",
];

/// Generates `<word>.<domain>` for every word of a wordlist.
///
/// An active source: it only runs when passive sources came up short.
/// With [`with_resolve_filter`](Self::with_resolve_filter) set, only names
/// that resolve are returned.
#[derive(Debug, Clone)]
pub struct WordlistSource {
    words: Vec<String>,
    resolve_concurrency: Option<usize>,
}

impl WordlistSource {
    /// Creates a source from the given words. Blank lines and `#` comments
    /// are skipped.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| normalize_name(w.as_ref()))
            .filter(|w| !w.is_empty() && !w.starts_with('#'))
            .collect();
        Self {
            words,
            resolve_concurrency: None,
        }
    }

    /// Loads one word per line from `path`.
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EngineError::configuration(format!("cannot read wordlist {}: {e}", path.display()))
        })?;
        let source = Self::new(contents.lines());
        if source.words.is_empty() {
            return Err(EngineError::configuration(format!(
                "wordlist {} is empty",
                path.display()
            )));
        }
        tracing::debug!(path = %path.display(), words = source.words.len(), "Loaded wordlist");
        Ok(source)
    }

    /// Keeps only names that resolve, resolving up to `concurrency` at once.
    pub fn with_resolve_filter(mut self, concurrency: usize) -> Self {
        self.resolve_concurrency = Some(concurrency.max(1));
        self
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` if there are no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for WordlistSource {
    fn default() -> Self {
        Self::new(DEFAULT_WORDLIST.iter().copied())
    }
}

#[async_trait]
impl CandidateSource for WordlistSource {
    fn name(&self) -> &str {
        "wordlist"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Active
    }

    async fn candidates(&self, domain: &str) -> Result<Vec<String>, SourceError> {
        let names: Vec<String> = self.words.iter().map(|w| format!("{w}.{domain}")).collect();

        let Some(concurrency) = self.resolve_concurrency else {
            return Ok(names);
        };

        let resolved: Vec<String> = stream::iter(names)
            .map(|name| async move {
                let found = tokio::net::lookup_host((name.as_str(), 0))
                    .await
                    .map(|mut addrs| addrs.next().is_some())
                    .unwrap_or(false);
                found.then_some(name)
            })
            .buffered(concurrency)
            .filter_map(|name| async move { name })
            .collect()
            .await;

        Ok(resolved)
    }
}
