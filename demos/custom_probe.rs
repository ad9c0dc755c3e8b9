//! Custom probe example.
//!
//! This example shows how to implement the `Probe` trait for your own
//! check and plug it into a registry next to the built-in ones.
//!
//! Run with: cargo run --example custom_probe

use async_trait::async_trait;
use subscout::backends::{DnsProbe, StaticSource};
use subscout::prelude::*;

/// Flags hosts whose name suggests a non-production environment by
/// reporting a synthetic `Server` value.
#[derive(Debug)]
struct StagingProbe {
    markers: Vec<&'static str>,
}

#[async_trait]
impl Probe for StagingProbe {
    fn name(&self) -> &str {
        "staging-marker"
    }

    fn phase(&self) -> ProbePhase {
        ProbePhase::Classification
    }

    async fn probe(&self, target: &ProbeTarget) -> Result<Option<ResultRecord>, ProbeError> {
        let label = target.subdomain.split('.').next().unwrap_or_default();
        if target.known.server.is_some() || !self.markers.iter().any(|m| *m == label) {
            return Ok(None);
        }
        Ok(Some(
            ResultRecord::new(&target.subdomain).with_server(format!("non-production ({label})")),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Subscout Custom Probe Example ===\n");

    let registry = JobRegistry::builder()
        .add_source(StaticSource::new(["www.example.com", "staging.example.com", "dev.example.com"]))
        .add_probe(DnsProbe::new())
        .add_probe(StagingProbe {
            markers: vec!["staging", "dev", "test"],
        })
        .build()?;

    let id = registry.create("example.com")?;
    registry.job(id)?.wait().await;

    let snapshot = registry.get(id)?;
    println!("Scan {} finished: {}", snapshot.id, snapshot.state);
    for record in &snapshot.results {
        println!(
            "  {:<28} ip={:<16} server={}",
            record.subdomain,
            record.ip.map(|ip| ip.to_string()).unwrap_or_else(|| "-".into()),
            record.server.as_deref().unwrap_or("-"),
        );
    }

    let artifact = export(&registry, id, ExportFormat::Json)?;
    println!("\n{}", String::from_utf8_lossy(&artifact.body));

    registry.shutdown().await;
    Ok(())
}
