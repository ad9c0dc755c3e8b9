//! Cloudflare classification from what the probing phase found.

use crate::core::{CloudflareState, Probe, ProbeError, ProbePhase, ProbeTarget, ResultRecord};

use async_trait::async_trait;

/// Classifies a subdomain as fronted by Cloudflare from its `Server` header.
///
/// Runs after probing. Leaves the state alone when a probe already
/// determined it (for example from a `cf-ray` header), and reports nothing
/// for hosts that never answered HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct ServerHeaderClassifier;

impl ServerHeaderClassifier {
    /// Creates a classifier.
    pub fn new() -> Self {
        Self
    }

    fn classify(known: &ResultRecord) -> Option<CloudflareState> {
        if known.cloudflare.is_known() {
            return None;
        }
        match &known.server {
            Some(server) if server.to_ascii_lowercase().contains("cloudflare") => {
                Some(CloudflareState::Enabled)
            }
            _ if known.is_active() => Some(CloudflareState::Disabled),
            _ => None,
        }
    }
}

#[async_trait]
impl Probe for ServerHeaderClassifier {
    fn name(&self) -> &str {
        "server-header"
    }

    fn phase(&self) -> ProbePhase {
        ProbePhase::Classification
    }

    async fn probe(&self, target: &ProbeTarget) -> Result<Option<ResultRecord>, ProbeError> {
        Ok(Self::classify(&target.known)
            .map(|state| ResultRecord::new(&target.subdomain).with_cloudflare(state)))
    }
}
