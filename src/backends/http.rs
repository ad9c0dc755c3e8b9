//! HTTP(S) probing and the keyless passive sources: crt.sh, HackerTarget
//! and AlienVault OTX.
//!
//! # Requirements
//!
//! - The `http` feature
//! - Network access to the probed hosts and to the passive source APIs

use crate::core::{
    CandidateSource, CloudflareState, EngineError, EngineResult, Probe, ProbeError, ProbeTarget,
    ResultRecord, SourceError,
};

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// HTTP probe configuration.
#[derive(Debug, Clone)]
pub struct HttpProbeConfig {
    /// Request timeout.
    pub timeout: Duration,

    /// Whether to follow redirects. The status recorded is the final one.
    pub follow_redirects: bool,

    /// Whether invalid certificates are accepted on `https://`.
    pub accept_invalid_certs: bool,

    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for HttpProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            follow_redirects: true,
            accept_invalid_certs: true,
            user_agent: concat!("subscout/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpProbeConfig {
    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables following redirects.
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Enables or disables accepting invalid certificates.
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

/// Which scheme a [`HttpProbe`] checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain `http://`.
    Http,
    /// `https://`.
    Https,
}

impl Scheme {
    fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Requests `<scheme>://<subdomain>/` and records the status code, the
/// `Server` header and whether a `cf-ray` header was present.
///
/// # Example
///
/// ```rust,ignore
/// use subscout::backends::HttpProbe;
///
/// let http = HttpProbe::http()?;
/// let https = HttpProbe::https()?;
/// ```
#[derive(Debug)]
pub struct HttpProbe {
    scheme: Scheme,
    name: String,
    client: reqwest::Client,
}

impl HttpProbe {
    /// Creates a probe for `scheme` with the given configuration.
    pub fn new(scheme: Scheme, config: HttpProbeConfig) -> EngineResult<Self> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(redirect)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| {
                EngineError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            scheme,
            name: scheme.as_str().to_string(),
            client,
        })
    }

    /// A plain HTTP probe with default configuration.
    pub fn http() -> EngineResult<Self> {
        Self::new(Scheme::Http, HttpProbeConfig::default())
    }

    /// An HTTPS probe with default configuration.
    pub fn https() -> EngineResult<Self> {
        Self::new(Scheme::Https, HttpProbeConfig::default())
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self, target: &ProbeTarget) -> Result<Option<ResultRecord>, ProbeError> {
        let url = format!("{}://{}/", self.scheme.as_str(), target.subdomain);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProbeError::connection(&url, e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers();
        let server = headers
            .get(reqwest::header::SERVER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let cloudflare = if headers.contains_key("cf-ray") {
            CloudflareState::Enabled
        } else {
            CloudflareState::Unknown
        };

        let mut record = ResultRecord::new(&target.subdomain).with_cloudflare(cloudflare);
        record = match self.scheme {
            Scheme::Http => record.with_http_status(status),
            Scheme::Https => record.with_https_status(status),
        };
        if let Some(server) = server {
            record = record.with_server(server);
        }

        Ok(Some(record))
    }
}

fn source_client(timeout: Duration) -> EngineResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("subscout/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| EngineError::configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Sends `request` and maps transport failures and error statuses.
async fn fetch(
    source: &str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, SourceError> {
    let response = request
        .send()
        .await
        .map_err(|e| SourceError::unavailable(source, e.to_string()))?;

    if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(SourceError::RateLimited {
            source_name: source.to_string(),
        });
    }
    if !response.status().is_success() {
        return Err(SourceError::unavailable(
            source,
            format!("API error: {}", response.status()),
        ));
    }
    Ok(response)
}

/// One entry of crt.sh's JSON output.
#[derive(Debug, Deserialize)]
struct CrtShEntry {
    name_value: String,
}

/// Passive source querying the crt.sh certificate transparency log.
#[derive(Debug)]
pub struct CrtShSource {
    base_url: String,
    client: reqwest::Client,
}

impl CrtShSource {
    /// Creates a source with the given request timeout.
    pub fn new(timeout: Duration) -> EngineResult<Self> {
        Ok(Self {
            base_url: "https://crt.sh".to_string(),
            client: source_client(timeout)?,
        })
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Flattens crt.sh entries into names. Entries may hold several names
/// separated by newlines; filtering happens in the pipeline.
fn parse_entries(entries: Vec<CrtShEntry>) -> Vec<String> {
    entries
        .into_iter()
        .flat_map(|entry| {
            entry
                .name_value
                .lines()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

#[async_trait]
impl CandidateSource for CrtShSource {
    fn name(&self) -> &str {
        "crtsh"
    }

    async fn candidates(&self, domain: &str) -> Result<Vec<String>, SourceError> {
        let request = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[("q", format!("%.{domain}")), ("output", "json".to_string())]);
        let entries: Vec<CrtShEntry> = fetch("crtsh", request)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::invalid_response("crtsh", e.to_string()))?;

        Ok(parse_entries(entries))
    }
}

/// Passive source querying HackerTarget's keyless host search.
///
/// The API answers in plain text, one `host,ip` pair per line, and
/// reports errors with a 200 status and a message body.
#[derive(Debug)]
pub struct HackerTargetSource {
    base_url: String,
    client: reqwest::Client,
}

impl HackerTargetSource {
    /// Creates a source with the given request timeout.
    pub fn new(timeout: Duration) -> EngineResult<Self> {
        Ok(Self {
            base_url: "https://api.hackertarget.com".to_string(),
            client: source_client(timeout)?,
        })
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

fn parse_hostsearch(body: &str) -> Result<Vec<String>, SourceError> {
    let trimmed = body.trim();
    if trimmed.starts_with("API count exceeded") {
        return Err(SourceError::RateLimited {
            source_name: "hackertarget".to_string(),
        });
    }
    if trimmed.starts_with("error") {
        return Err(SourceError::invalid_response("hackertarget", trimmed));
    }

    Ok(trimmed
        .lines()
        .filter_map(|line| line.split(',').next())
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect())
}

#[async_trait]
impl CandidateSource for HackerTargetSource {
    fn name(&self) -> &str {
        "hackertarget"
    }

    async fn candidates(&self, domain: &str) -> Result<Vec<String>, SourceError> {
        let request = self
            .client
            .get(format!("{}/hostsearch/", self.base_url))
            .query(&[("q", domain)]);
        let body = fetch("hackertarget", request)
            .await?
            .text()
            .await
            .map_err(|e| SourceError::invalid_response("hackertarget", e.to_string()))?;

        parse_hostsearch(&body)
    }
}

#[derive(Debug, Deserialize)]
struct OtxPassiveDns {
    #[serde(default)]
    passive_dns: Vec<OtxRecord>,
}

#[derive(Debug, Deserialize)]
struct OtxRecord {
    hostname: String,
}

/// Passive source querying AlienVault OTX passive DNS, without an API key.
#[derive(Debug)]
pub struct OtxSource {
    base_url: String,
    client: reqwest::Client,
}

impl OtxSource {
    /// Creates a source with the given request timeout.
    pub fn new(timeout: Duration) -> EngineResult<Self> {
        Ok(Self {
            base_url: "https://otx.alienvault.com".to_string(),
            client: source_client(timeout)?,
        })
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl CandidateSource for OtxSource {
    fn name(&self) -> &str {
        "otx"
    }

    async fn candidates(&self, domain: &str) -> Result<Vec<String>, SourceError> {
        let request = self.client.get(format!(
            "{}/api/v1/indicators/domain/{domain}/passive_dns",
            self.base_url
        ));
        let answer: OtxPassiveDns = fetch("otx", request)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::invalid_response("otx", e.to_string()))?;

        Ok(answer
            .passive_dns
            .into_iter()
            .map(|record| record.hostname)
            .collect())
    }
}
