//! HTTP service exposing subdomain scans.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use subscout::backends::{DnsProbe, ServerHeaderClassifier, WordlistSource};
use subscout::manager::{JobRegistry, PipelineConfig, RegistryConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "subscout-server", version, about = "Subdomain scan service")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "SUBSCOUT_BIND", default_value = "0.0.0.0:5000")]
    bind: SocketAddr,

    /// Probe calls in flight per scan.
    #[arg(long, env = "SUBSCOUT_CONCURRENCY", default_value_t = 50)]
    concurrency: usize,

    /// Per-probe timeout in seconds.
    #[arg(long, env = "SUBSCOUT_PROBE_TIMEOUT_SECS", default_value_t = 5)]
    probe_timeout_secs: u64,

    /// Per-scan deadline in seconds, 0 to disable.
    #[arg(long, env = "SUBSCOUT_JOB_DEADLINE_SECS", default_value_t = 600)]
    job_deadline_secs: u64,

    /// Maximum number of scans running at once.
    #[arg(long, env = "SUBSCOUT_MAX_ACTIVE_JOBS", default_value_t = 16)]
    max_active_jobs: usize,

    /// Finished scans kept for polling and export.
    #[arg(long, env = "SUBSCOUT_RETAIN_COMPLETED", default_value_t = 64)]
    retain_completed: usize,

    /// Wordlist file for active enumeration, one label per line.
    #[arg(long, env = "SUBSCOUT_WORDLIST")]
    wordlist: Option<PathBuf>,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        let deadline = (self.job_deadline_secs > 0).then(|| Duration::from_secs(self.job_deadline_secs));
        PipelineConfig::default()
            .with_max_concurrency(self.concurrency)
            .with_probe_timeout(Duration::from_secs(self.probe_timeout_secs))
            .with_job_deadline(deadline)
    }

    fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::new()
            .with_max_active_jobs(self.max_active_jobs)
            .with_retain_completed(self.retain_completed)
    }
}

fn build_registry(args: &Args) -> Result<JobRegistry, Box<dyn std::error::Error>> {
    let wordlist = match &args.wordlist {
        Some(path) => WordlistSource::from_file(path)?,
        None => WordlistSource::default(),
    };

    let builder = JobRegistry::builder()
        .with_config(args.registry_config())
        .with_pipeline_config(args.pipeline_config())
        .add_source(wordlist.with_resolve_filter(args.concurrency))
        .add_probe(DnsProbe::new())
        .add_probe(ServerHeaderClassifier::new());

    #[cfg(feature = "http")]
    let builder = {
        use subscout::backends::{CrtShSource, HackerTargetSource, HttpProbe, OtxSource};
        builder
            .add_source(CrtShSource::new(Duration::from_secs(15))?)
            .add_source(HackerTargetSource::new(Duration::from_secs(10))?)
            .add_source(OtxSource::new(Duration::from_secs(10))?)
            .add_probe(HttpProbe::http()?)
            .add_probe(HttpProbe::https()?)
    };

    Ok(builder.build()?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,subscout::audit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let registry = build_registry(&args)?;
    let app = subscout::server::router(registry.clone());

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(bind = %args.bind, "subscout server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown().await;
    info!("all scans stopped");
    Ok(())
}
