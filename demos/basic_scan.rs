//! Basic scan example demonstrating submit, poll and export.
//!
//! This example shows how to:
//! - Build a JobRegistry with sources and probes
//! - Submit a domain and poll until the scan finishes
//! - Export the results
//!
//! Run with: cargo run --example basic_scan

use std::time::Duration;
use subscout::backends::{MockProbe, ServerHeaderClassifier, StaticSource};
use subscout::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Subscout Basic Scan Example ===\n");

    // A fixed candidate list stands in for crt.sh and friends
    let source = StaticSource::new([
        "www.example.com",
        "api.example.com",
        "cdn.example.com",
        "*.example.com",
        "unrelated.example.org",
    ]);

    // A simulated HTTPS probe with a little latency
    let https = MockProbe::new()
        .with_name("https")
        .with_latency(Duration::from_millis(150))
        .with_default_record(ResultRecord::new("").with_https_status(200).with_server("nginx"))
        .with_response(
            "cdn.example.com",
            ResultRecord::new("cdn.example.com")
                .with_https_status(200)
                .with_server("cloudflare"),
        );

    let registry = JobRegistry::builder()
        .add_source(source)
        .add_probe(https)
        .add_probe(ServerHeaderClassifier::new())
        .with_pipeline_config(PipelineConfig::default().with_max_concurrency(2))
        .build()?;

    let id = registry.create("Example.com")?;
    println!("Submitted scan {id}");

    // Poll like a client would
    loop {
        let response = poll(&registry, id)?;
        match &response {
            PollResponse::InProgress {
                progress,
                status,
                subdomains,
            } => println!("  {progress:>3}% {status:<22} {} found", subdomains.len()),
            PollResponse::Completed { count, .. } => {
                println!("\n✅ Scan completed with {count} subdomains");
                break;
            }
            PollResponse::Failed { error, .. } => {
                println!("\n❌ Scan failed: {error}");
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let artifact = export(&registry, id, ExportFormat::Text)?;
    println!("\n=== {} ===", artifact.filename);
    println!("{}", String::from_utf8_lossy(&artifact.body));

    registry.shutdown().await;
    Ok(())
}
