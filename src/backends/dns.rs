//! DNS resolution probe.

use crate::core::{Probe, ProbeError, ProbeTarget, ResultRecord};

use async_trait::async_trait;
use std::net::IpAddr;

/// Resolves a subdomain through the system resolver and records its
/// address, preferring IPv4.
#[derive(Debug, Clone, Default)]
pub struct DnsProbe;

impl DnsProbe {
    /// Creates a DNS probe.
    pub fn new() -> Self {
        Self
    }
}

/// Picks the first IPv4 address, falling back to the first address.
fn preferred_address(addrs: impl IntoIterator<Item = IpAddr>) -> Option<IpAddr> {
    let mut fallback = None;
    for addr in addrs {
        if addr.is_ipv4() {
            return Some(addr);
        }
        fallback.get_or_insert(addr);
    }
    fallback
}

#[async_trait]
impl Probe for DnsProbe {
    fn name(&self) -> &str {
        "dns"
    }

    async fn probe(&self, target: &ProbeTarget) -> Result<Option<ResultRecord>, ProbeError> {
        let addrs = tokio::net::lookup_host((target.subdomain.as_str(), 0))
            .await
            .map_err(|e| ProbeError::Resolution {
                subdomain: target.subdomain.clone(),
                message: e.to_string(),
            })?;

        Ok(preferred_address(addrs.map(|a| a.ip()))
            .map(|ip| ResultRecord::new(&target.subdomain).with_ip(ip)))
    }
}
