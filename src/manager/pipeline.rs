//! The multi-stage scan pipeline that drives a job to a terminal state.

use crate::core::{
    ArcProbe, ArcSource, EngineError, EngineResult, JobState, ProbeError, ProbePhase,
    ProbeTarget, ResultRecord, SourceError, SourceKind, Stage,
};
use crate::job::{CandidateSet, ScanJob, StageWeights};
use crate::manager::retry::{retry_async, RetryConfig};

use futures::future::{self, join_all};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for running scans.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of probe calls in flight per job.
    pub max_concurrency: usize,

    /// Time budget for a single probe call.
    pub probe_timeout: Duration,

    /// Time budget for a single candidate-source call.
    pub source_timeout: Duration,

    /// Overall deadline for a job, if any.
    pub job_deadline: Option<Duration>,

    /// Active sources only run if passive ones found fewer candidates.
    pub active_enumeration_threshold: usize,

    /// Retry configuration for candidate sources.
    pub retry: RetryConfig,

    /// Progress ranges per stage.
    pub weights: StageWeights,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 50,
            probe_timeout: Duration::from_secs(5),
            source_timeout: Duration::from_secs(120),
            job_deadline: Some(Duration::from_secs(600)),
            active_enumeration_threshold: 50,
            retry: RetryConfig::default(),
            weights: StageWeights::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-job probe concurrency.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the candidate-source timeout.
    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    /// Sets or clears the job deadline.
    pub fn with_job_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.job_deadline = deadline;
        self
    }

    /// Sets the active-enumeration threshold.
    pub fn with_active_enumeration_threshold(mut self, threshold: usize) -> Self {
        self.active_enumeration_threshold = threshold;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the stage weights.
    pub fn with_weights(mut self, weights: StageWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Checks the configuration for values the pipeline cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_concurrency == 0 {
            return Err(EngineError::configuration("max_concurrency must be at least 1"));
        }
        if self.probe_timeout.is_zero() {
            return Err(EngineError::configuration("probe_timeout must be non-zero"));
        }
        if self.source_timeout.is_zero() {
            return Err(EngineError::configuration("source_timeout must be non-zero"));
        }
        self.weights.validate()
    }
}

/// Sources, probes and configuration shared by every job of a registry.
#[derive(Debug)]
pub struct ScanPipeline {
    sources: Vec<ArcSource>,
    probes: Vec<ArcProbe>,
    config: PipelineConfig,
}

impl ScanPipeline {
    /// Creates a pipeline. At least one candidate source is required.
    pub fn new(
        sources: Vec<ArcSource>,
        probes: Vec<ArcProbe>,
        config: PipelineConfig,
    ) -> EngineResult<Self> {
        if sources.is_empty() {
            return Err(EngineError::configuration(
                "At least one candidate source is required",
            ));
        }
        config.validate()?;
        Ok(Self {
            sources,
            probes,
            config,
        })
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the registered sources.
    pub fn sources(&self) -> &[ArcSource] {
        &self.sources
    }

    /// Returns the registered probes.
    pub fn probes(&self) -> &[ArcProbe] {
        &self.probes
    }

    /// Runs `job` to a terminal state and returns that state.
    ///
    /// Orchestration failures, the job deadline and cancellation all end in
    /// `Failed`; individual probe failures never do.
    pub async fn run(&self, job: &ScanJob) -> JobState {
        if !job.start() {
            return job.state();
        }
        crate::audit::emit_job_started(job);

        let token = job.cancellation_token();
        let deadline = async {
            match self.config.job_deadline {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => future::pending::<Duration>().await,
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(EngineError::Cancelled),
            limit = deadline => Err(EngineError::DeadlineExceeded { elapsed: limit }),
            result = self.execute(job) => result,
        };

        match outcome {
            Ok(()) => {
                job.complete();
            }
            Err(error) => {
                tracing::warn!(
                    job_id = %job.id(),
                    domain = %job.domain(),
                    error = %error,
                    "Scan failed"
                );
                job.fail(&error);
            }
        }

        crate::audit::emit_job_finished(&job.snapshot());
        job.state()
    }

    async fn execute(&self, job: &ScanJob) -> EngineResult<()> {
        let candidates = self.enumerate(job).await?;

        tracing::info!(
            job_id = %job.id(),
            domain = %job.domain(),
            candidate_count = candidates.len(),
            "Enumeration finished"
        );

        self.run_phase(job, Stage::Probing, ProbePhase::Probing, &candidates)
            .await;
        self.run_phase(
            job,
            Stage::Classification,
            ProbePhase::Classification,
            &candidates,
        )
        .await;

        Ok(())
    }

    /// Collects candidates from passive sources, then from active sources
    /// if the passive ones came up short.
    async fn enumerate(&self, job: &ScanJob) -> EngineResult<Vec<String>> {
        let mut candidates = CandidateSet::new(job.domain());
        let mut failures: Vec<SourceError> = Vec::new();
        let mut invoked = 0usize;

        let passive: Vec<&ArcSource> = self
            .sources
            .iter()
            .filter(|s| s.kind() == SourceKind::Passive)
            .collect();
        let active: Vec<&ArcSource> = self
            .sources
            .iter()
            .filter(|s| s.kind() == SourceKind::Active)
            .collect();

        if !passive.is_empty() {
            invoked += passive.len();
            self.query_sources(
                job,
                Stage::PassiveEnumeration,
                &passive,
                &mut candidates,
                &mut failures,
            )
            .await;
        }

        if !active.is_empty() && candidates.len() < self.config.active_enumeration_threshold {
            invoked += active.len();
            self.query_sources(
                job,
                Stage::ActiveEnumeration,
                &active,
                &mut candidates,
                &mut failures,
            )
            .await;
        }

        if invoked > 0 && failures.len() == invoked {
            let reasons: Vec<String> = failures.iter().map(ToString::to_string).collect();
            return Err(EngineError::orchestration(format!(
                "every candidate source failed: {}",
                reasons.join("; ")
            )));
        }

        Ok(candidates.into_vec())
    }

    async fn query_sources(
        &self,
        job: &ScanJob,
        stage: Stage,
        sources: &[&ArcSource],
        candidates: &mut CandidateSet,
        failures: &mut Vec<SourceError>,
    ) {
        job.begin_stage(stage, sources.len() as u64);
        crate::audit::emit_stage_entered(job, stage, sources.len() as u64);

        let domain = job.domain();
        let calls = sources.iter().map(move |source| async move {
            let result = self.query_source(source, domain).await;
            job.advance(1);
            result
        });

        // join_all keeps source order, so candidate order is deterministic.
        for (source, result) in sources.iter().zip(join_all(calls).await) {
            match result {
                Ok(names) => {
                    let added = candidates.extend(&names);
                    tracing::debug!(
                        job_id = %job.id(),
                        source = source.name(),
                        returned = names.len(),
                        added = added.len(),
                        "Candidate source answered"
                    );
                    for name in added {
                        job.store().upsert(ResultRecord::new(name));
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        job_id = %job.id(),
                        source = source.name(),
                        error = %error,
                        "Candidate source failed, continuing with others"
                    );
                    failures.push(error);
                }
            }
        }
    }

    async fn query_source(&self, source: &ArcSource, domain: &str) -> Result<Vec<String>, SourceError> {
        let timeout = self.config.source_timeout;
        retry_async(&self.config.retry, SourceError::is_recoverable, move || async move {
            let call = AssertUnwindSafe(source.candidates(domain)).catch_unwind();
            match tokio::time::timeout(timeout, call).await {
                Ok(Ok(result)) => result,
                Ok(Err(payload)) => Err(SourceError::unavailable(
                    source.name(),
                    format!("source panicked: {}", panic_message(&*payload)),
                )),
                Err(_) => Err(SourceError::Timeout {
                    source_name: source.name().to_string(),
                    elapsed: timeout,
                }),
            }
        })
        .await
    }

    /// Runs every probe of `phase` against every candidate with bounded
    /// concurrency.
    async fn run_phase(&self, job: &ScanJob, stage: Stage, phase: ProbePhase, candidates: &[String]) {
        let probes: Vec<ArcProbe> = self
            .probes
            .iter()
            .filter(|p| p.phase() == phase)
            .cloned()
            .collect();
        let units = (candidates.len() * probes.len()) as u64;

        job.begin_stage(stage, units);
        crate::audit::emit_stage_entered(job, stage, units);
        if units == 0 {
            return;
        }

        let mut work = candidates
            .iter()
            .flat_map(|subdomain| {
                probes
                    .iter()
                    .map(move |probe| (subdomain.clone(), Arc::clone(probe)))
            })
            .collect::<Vec<(String, ArcProbe)>>()
            .into_iter();

        let token = job.cancellation_token();
        let mut in_flight = FuturesUnordered::new();
        loop {
            while in_flight.len() < self.config.max_concurrency && !token.is_cancelled() {
                match work.next() {
                    Some((subdomain, probe)) => in_flight.push(self.dispatch(job, probe, subdomain)),
                    None => break,
                }
            }
            match in_flight.next().await {
                Some(()) => job.advance(1),
                None => break,
            }
        }
    }

    /// Runs one probe against one subdomain and stores what it found.
    async fn dispatch(&self, job: &ScanJob, probe: ArcProbe, subdomain: String) {
        let target = match job.store().get(&subdomain) {
            Some(known) => ProbeTarget::from_record(known),
            None => ProbeTarget::new(&subdomain),
        };

        let timeout = self.config.probe_timeout;
        let call = AssertUnwindSafe(probe.probe(&target)).catch_unwind();
        let result = tokio::select! {
            _ = job.cancellation_token().cancelled() => Err(ProbeError::Cancelled),
            outcome = tokio::time::timeout(timeout, call) => match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(payload)) => Err(ProbeError::other(format!(
                    "probe {} panicked: {}",
                    probe.name(),
                    panic_message(&*payload)
                ))),
                Err(_) => Err(ProbeError::timeout(probe.name(), timeout)),
            }
        };

        match result {
            Ok(Some(record)) if record.subdomain == target.subdomain => {
                job.store().upsert(record);
            }
            Ok(Some(record)) => {
                tracing::warn!(
                    job_id = %job.id(),
                    probe = probe.name(),
                    expected = %target.subdomain,
                    reported = %record.subdomain,
                    "Probe reported on a different subdomain, dropping result"
                );
            }
            Ok(None) => {}
            Err(error) => {
                tracing::debug!(
                    job_id = %job.id(),
                    probe = probe.name(),
                    subdomain = %target.subdomain,
                    error = %error,
                    "Probe failed"
                );
            }
        }
    }
}

/// Extracts the message of a caught panic.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{MockProbe, MockSource};
    use crate::core::CloudflareState;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn job() -> ScanJob {
        ScanJob::new("example.com", StageWeights::default(), CancellationToken::new())
    }

    fn arc_source(source: impl crate::core::CandidateSource + 'static) -> ArcSource {
        Arc::new(source)
    }

    fn arc_probe(probe: impl crate::core::Probe + 'static) -> ArcProbe {
        Arc::new(probe)
    }

    fn pipeline(sources: Vec<ArcSource>, probes: Vec<ArcProbe>) -> ScanPipeline {
        ScanPipeline::new(
            sources,
            probes,
            PipelineConfig::default().with_retry(RetryConfig::no_retry()),
        )
        .unwrap()
    }

    #[test]
    fn test_pipeline_requires_source() {
        let result = ScanPipeline::new(Vec::new(), Vec::new(), PipelineConfig::default());
        assert!(matches!(result, Err(EngineError::Configuration { .. })));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&*payload), "static message");
        let payload: Box<dyn Any + Send> = Box::new(format!("code {}", 7));
        assert_eq!(panic_message(&*payload), "code 7");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }

    #[test]
    fn test_config_validation() {
        let config = PipelineConfig::default().with_max_concurrency(0);
        assert!(config.validate().is_err());
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_run_completes_and_merges_probe_results() {
        let source = MockSource::new(["www.example.com", "api.example.com", "www.example.com"]);
        let dns = MockProbe::new()
            .with_name("dns")
            .with_default_record(ResultRecord::new("").with_ip("10.0.0.1".parse().unwrap()));
        let http = MockProbe::new()
            .with_name("http")
            .with_response(
                "www.example.com",
                ResultRecord::new("www.example.com").with_http_status(200),
            );

        let pipeline = pipeline(
            vec![arc_source(source)],
            vec![arc_probe(dns), arc_probe(http)],
        );
        let job = job();

        assert_eq!(pipeline.run(&job).await, JobState::Completed);

        let snapshot = job.snapshot();
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.results.len(), 2);
        assert_eq!(snapshot.results[0].subdomain, "www.example.com");
        assert_eq!(snapshot.results[0].http_status, Some(200));
        assert!(snapshot.results[0].ip.is_some());
        assert_eq!(snapshot.results[1].subdomain, "api.example.com");
        assert!(snapshot.results[1].ip.is_some());
        assert!(snapshot.results[1].http_status.is_none());
    }

    #[tokio::test]
    async fn test_probe_failures_do_not_fail_job() {
        let source = MockSource::new(["a.example.com", "b.example.com"]);
        let probe = MockProbe::new()
            .with_default_record(ResultRecord::new("").with_https_status(200))
            .failing_on("a.example.com");

        let pipeline = pipeline(vec![arc_source(source)], vec![arc_probe(probe)]);
        let job = job();

        assert_eq!(pipeline.run(&job).await, JobState::Completed);
        let snapshot = job.snapshot();
        assert_eq!(snapshot.results.len(), 2);
        assert!(snapshot.results[0].https_status.is_none());
        assert_eq!(snapshot.results[1].https_status, Some(200));
    }

    #[tokio::test]
    async fn test_all_sources_failing_fails_job() {
        let first = MockSource::failing(SourceError::unavailable("first", "connection refused"))
            .with_name("first");
        let second = MockSource::failing(SourceError::unavailable("second", "HTTP 503"))
            .with_name("second");

        let pipeline = pipeline(vec![arc_source(first), arc_source(second)], Vec::new());
        let job = job();

        assert_eq!(pipeline.run(&job).await, JobState::Failed);
        let snapshot = job.snapshot();
        let error = snapshot.error.unwrap();
        assert!(error.contains("every candidate source failed"));
        assert!(error.contains("first"));
        assert!(error.contains("second"));
        assert!(snapshot.results.is_empty());
        assert!(snapshot.progress < 100);
    }

    #[tokio::test]
    async fn test_partial_source_failure_is_tolerated() {
        let broken = MockSource::failing(SourceError::unavailable("broken", "down"));
        let working = MockSource::new(["mail.example.com"]);

        let pipeline = pipeline(vec![arc_source(broken), arc_source(working)], Vec::new());
        let job = job();

        assert_eq!(pipeline.run(&job).await, JobState::Completed);
        assert_eq!(job.snapshot().results.len(), 1);
    }

    #[tokio::test]
    async fn test_active_sources_only_run_below_threshold() {
        let passive = Arc::new(MockSource::new(["a.example.com", "b.example.com"]));
        let active = Arc::new(
            MockSource::new(["c.example.com"])
                .with_name("wordlist")
                .with_kind(SourceKind::Active),
        );

        let config = PipelineConfig::default().with_active_enumeration_threshold(2);
        let pipeline = ScanPipeline::new(
            vec![passive.clone() as ArcSource, active.clone() as ArcSource],
            Vec::new(),
            config,
        )
        .unwrap();
        let job = job();
        pipeline.run(&job).await;
        assert_eq!(active.call_count(), 0);
        assert_eq!(job.snapshot().results.len(), 2);

        let config = PipelineConfig::default().with_active_enumeration_threshold(3);
        let pipeline = ScanPipeline::new(
            vec![passive as ArcSource, active.clone() as ArcSource],
            Vec::new(),
            config,
        )
        .unwrap();
        let job = self::job();
        pipeline.run(&job).await;
        assert_eq!(active.call_count(), 1);
        assert_eq!(job.snapshot().results.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_is_recoverable() {
        let source = MockSource::new(["slow.example.com"]);
        let probe = MockProbe::new()
            .with_default_record(ResultRecord::new("").with_http_status(200))
            .with_latency(Duration::from_secs(30));

        let config = PipelineConfig::default().with_probe_timeout(Duration::from_secs(1));
        let pipeline =
            ScanPipeline::new(vec![arc_source(source)], vec![arc_probe(probe)], config).unwrap();
        let job = job();

        assert_eq!(pipeline.run(&job).await, JobState::Completed);
        assert!(job.snapshot().results[0].http_status.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_deadline_fails_job_and_keeps_results() {
        let source = MockSource::new(["a.example.com", "b.example.com"]);
        let probe = MockProbe::new().with_latency(Duration::from_secs(60));

        let config = PipelineConfig::default()
            .with_probe_timeout(Duration::from_secs(120))
            .with_job_deadline(Some(Duration::from_secs(10)));
        let pipeline =
            ScanPipeline::new(vec![arc_source(source)], vec![arc_probe(probe)], config).unwrap();
        let job = job();

        assert_eq!(pipeline.run(&job).await, JobState::Failed);
        let snapshot = job.snapshot();
        assert!(snapshot.error.unwrap().contains("deadline"));
        assert_eq!(snapshot.results.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_fails() {
        let pipeline = pipeline(vec![arc_source(MockSource::new(["a.example.com"]))], Vec::new());
        let job = job();
        job.cancellation_token().cancel();

        assert_eq!(pipeline.run(&job).await, JobState::Failed);
        assert_eq!(job.snapshot().error.as_deref(), Some("scan was cancelled"));
    }

    #[derive(Debug)]
    struct PanickingProbe {
        on: &'static str,
    }

    #[async_trait::async_trait]
    impl crate::core::Probe for PanickingProbe {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn probe(&self, target: &ProbeTarget) -> Result<Option<ResultRecord>, ProbeError> {
            if target.subdomain == self.on {
                panic!("lookup table corrupted");
            }
            Ok(Some(ResultRecord::new(&target.subdomain).with_http_status(200)))
        }
    }

    #[derive(Debug)]
    struct PanickingSource;

    #[async_trait::async_trait]
    impl crate::core::CandidateSource for PanickingSource {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn candidates(&self, _domain: &str) -> Result<Vec<String>, SourceError> {
            panic!("source exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_probe_only_loses_its_fields() {
        let source = MockSource::new(["a.example.com", "b.example.com", "c.example.com"]);
        let pipeline = pipeline(
            vec![arc_source(source)],
            vec![arc_probe(PanickingProbe { on: "b.example.com" })],
        );
        let job = job();

        assert_eq!(pipeline.run(&job).await, JobState::Completed);
        let snapshot = job.snapshot();
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.results.len(), 3);
        assert_eq!(snapshot.results[0].http_status, Some(200));
        assert!(snapshot.results[1].http_status.is_none());
        assert_eq!(snapshot.results[2].http_status, Some(200));
    }

    #[tokio::test]
    async fn test_panicking_source_counts_as_failed_source() {
        let pipeline = pipeline(vec![arc_source(PanickingSource)], Vec::new());
        let job = job();

        assert_eq!(pipeline.run(&job).await, JobState::Failed);
        let error = job.snapshot().error.unwrap();
        assert!(error.contains("every candidate source failed"));
        assert!(error.contains("source exploded"));

        let pipeline = self::pipeline(
            vec![arc_source(PanickingSource), arc_source(MockSource::new(["www.example.com"]))],
            Vec::new(),
        );
        let job = self::job();
        assert_eq!(pipeline.run(&job).await, JobState::Completed);
        assert_eq!(job.snapshot().results.len(), 1);
    }

    #[tokio::test]
    async fn test_bounded_dispatch_runs_every_unit() {
        let names: Vec<String> = (0..12).map(|i| format!("h{i}.example.com")).collect();
        let probe = Arc::new(
            MockProbe::new()
                .with_default_record(ResultRecord::new("").with_http_status(200))
                .with_latency(Duration::from_millis(5)),
        );
        let config = PipelineConfig::default()
            .with_max_concurrency(3)
            .with_retry(RetryConfig::no_retry());
        let pipeline = ScanPipeline::new(
            vec![arc_source(MockSource::new(names))],
            vec![probe.clone() as ArcProbe],
            config,
        )
        .unwrap();
        let job = job();

        assert_eq!(pipeline.run(&job).await, JobState::Completed);
        assert_eq!(probe.call_count(), 12);
        assert_eq!(job.snapshot().results.len(), 12);
    }

    #[tokio::test]
    async fn test_classification_sees_probing_results() {
        let source = MockSource::new(["cdn.example.com"]);
        let http = MockProbe::new().with_default_record(
            ResultRecord::new("")
                .with_https_status(200)
                .with_server("cloudflare"),
        );
        let classifier = crate::backends::ServerHeaderClassifier::new();

        let pipeline = pipeline(
            vec![arc_source(source)],
            vec![arc_probe(http), arc_probe(classifier)],
        );
        let job = job();
        pipeline.run(&job).await;

        assert_eq!(
            job.snapshot().results[0].cloudflare,
            CloudflareState::Enabled
        );
    }
}
