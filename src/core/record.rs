//! Per-subdomain result records.
//!
//! A [`ResultRecord`] is built up by several probes. Each probe fills the
//! fields it knows about and leaves the rest absent; the store merges the
//! partial records by subdomain.

use crate::core::types::{normalize_name, CloudflareState};

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Everything known about one discovered subdomain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Fully-qualified, lowercased name. The merge key.
    pub subdomain: String,

    /// Resolved address.
    pub ip: Option<IpAddr>,

    /// Status code of the plain HTTP probe.
    pub http_status: Option<u16>,

    /// Status code of the HTTPS probe.
    pub https_status: Option<u16>,

    /// Reported `Server` header.
    pub server: Option<String>,

    /// Cloudflare classification.
    pub cloudflare: CloudflareState,
}

impl ResultRecord {
    /// Creates a record with every optional field absent.
    pub fn new(subdomain: impl AsRef<str>) -> Self {
        Self {
            subdomain: normalize_name(subdomain.as_ref()),
            ip: None,
            http_status: None,
            https_status: None,
            server: None,
            cloudflare: CloudflareState::Unknown,
        }
    }

    /// Sets the resolved address.
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    /// Sets the HTTP status.
    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Sets the HTTPS status.
    pub fn with_https_status(mut self, status: u16) -> Self {
        self.https_status = Some(status);
        self
    }

    /// Sets the server header. Blank values are treated as absent.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        let server = server.into();
        let trimmed = server.trim();
        self.server = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Sets the Cloudflare classification.
    pub fn with_cloudflare(mut self, state: CloudflareState) -> Self {
        self.cloudflare = state;
        self
    }

    /// A record is active if at least one of the HTTP probes got an answer.
    pub fn is_active(&self) -> bool {
        self.http_status.is_some() || self.https_status.is_some()
    }

    /// Returns `true` if no field besides the name is known.
    pub fn is_bare(&self) -> bool {
        self.ip.is_none()
            && !self.is_active()
            && self.server.is_none()
            && !self.cloudflare.is_known()
    }

    /// Merges `incoming` into `self`.
    ///
    /// Present fields of `incoming` overwrite stored ones; absent fields
    /// (`None`, `CloudflareState::Unknown`) leave stored values untouched,
    /// so no field ever regresses from present to absent.
    pub fn merge(&mut self, incoming: &ResultRecord) {
        debug_assert_eq!(self.subdomain, incoming.subdomain);

        if incoming.ip.is_some() {
            self.ip = incoming.ip;
        }
        if incoming.http_status.is_some() {
            self.http_status = incoming.http_status;
        }
        if incoming.https_status.is_some() {
            self.https_status = incoming.https_status;
        }
        if let Some(server) = &incoming.server {
            self.server = Some(server.clone());
        }
        if incoming.cloudflare.is_known() {
            self.cloudflare = incoming.cloudflare;
        }
    }
}
