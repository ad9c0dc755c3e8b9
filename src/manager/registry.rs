//! The job registry: creates, runs, looks up and evicts scan jobs.

use crate::core::{
    normalize_domain, ArcProbe, ArcSource, CandidateSource, EngineError, EngineResult, JobId,
    JobState, Probe,
};
use crate::job::{JobSnapshot, ScanJob};
use crate::manager::pipeline::{panic_message, PipelineConfig, ScanPipeline};
use crate::manager::slots::JobSlots;

use dashmap::DashMap;
use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Limits for the registry itself.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of non-terminal jobs at once.
    pub max_active_jobs: usize,

    /// How many terminal jobs are kept before the oldest are evicted.
    pub retain_completed: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_active_jobs: 16,
            retain_completed: 64,
        }
    }
}

impl RegistryConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the active job limit.
    pub fn with_max_active_jobs(mut self, max: usize) -> Self {
        self.max_active_jobs = max;
        self
    }

    /// Sets how many terminal jobs are retained.
    pub fn with_retain_completed(mut self, retain: usize) -> Self {
        self.retain_completed = retain;
        self
    }
}

/// Builder for creating a [`JobRegistry`].
pub struct JobRegistryBuilder {
    sources: Vec<ArcSource>,
    probes: Vec<ArcProbe>,
    config: RegistryConfig,
    pipeline: PipelineConfig,
}

impl JobRegistryBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            probes: Vec::new(),
            config: RegistryConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }

    /// Adds a candidate source.
    pub fn add_source<S: CandidateSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Adds a candidate source wrapped in an Arc.
    pub fn add_arc_source(mut self, source: ArcSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Adds a probe.
    pub fn add_probe<P: Probe + 'static>(mut self, probe: P) -> Self {
        self.probes.push(Arc::new(probe));
        self
    }

    /// Adds a probe wrapped in an Arc.
    pub fn add_arc_probe(mut self, probe: ArcProbe) -> Self {
        self.probes.push(probe);
        self
    }

    /// Sets the registry configuration.
    pub fn with_config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the pipeline configuration.
    pub fn with_pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline = config;
        self
    }

    /// Builds the registry.
    pub fn build(self) -> EngineResult<JobRegistry> {
        if self.config.max_active_jobs == 0 {
            return Err(EngineError::configuration(
                "max_active_jobs must be at least 1",
            ));
        }
        if self.config.retain_completed == 0 {
            return Err(EngineError::configuration(
                "retain_completed must be at least 1",
            ));
        }

        let pipeline = ScanPipeline::new(self.sources, self.probes, self.pipeline)?;

        tracing::debug!(
            sources = pipeline.sources().len(),
            probes = pipeline.probes().len(),
            max_active_jobs = self.config.max_active_jobs,
            "Job registry built"
        );

        Ok(JobRegistry {
            inner: Arc::new(RegistryInner {
                jobs: DashMap::new(),
                finished: Mutex::new(VecDeque::new()),
                slots: JobSlots::new(self.config.max_active_jobs),
                pipeline: Arc::new(pipeline),
                config: self.config,
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        })
    }
}

impl Default for JobRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct RegistryInner {
    jobs: DashMap<JobId, Arc<ScanJob>>,
    /// Terminal jobs, oldest first.
    finished: Mutex<VecDeque<JobId>>,
    slots: JobSlots,
    pipeline: Arc<ScanPipeline>,
    config: RegistryConfig,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

/// Registry of scan jobs.
///
/// Cheap to clone; clones share the same jobs. Every job is owned by the
/// registry and driven by a task the registry spawns.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    inner: Arc<RegistryInner>,
}

impl JobRegistry {
    /// Creates a new builder.
    pub fn builder() -> JobRegistryBuilder {
        JobRegistryBuilder::new()
    }

    /// Validates `domain`, registers a new `Pending` job and starts it in
    /// the background. Returns as soon as the job is registered.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create(&self, domain: &str) -> EngineResult<JobId> {
        let domain = normalize_domain(domain)?;

        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            EngineError::configuration("JobRegistry::create requires a Tokio runtime")
        })?;

        if self.inner.shutdown.is_cancelled() {
            return Err(EngineError::internal("registry is shutting down"));
        }
        if !self.inner.slots.acquire() {
            tracing::warn!(
                domain = %domain,
                limit = self.inner.slots.max_active(),
                "Rejecting scan, too many active jobs"
            );
            return Err(EngineError::CapacityExceeded {
                limit: self.inner.slots.max_active(),
            });
        }

        let job = Arc::new(ScanJob::new(
            domain,
            self.inner.pipeline.config().weights.clone(),
            self.inner.shutdown.child_token(),
        ));
        let id = job.id();
        self.inner.jobs.insert(id, Arc::clone(&job));
        crate::audit::emit_job_created(&job);

        let guard = JobTaskGuard {
            inner: Arc::clone(&self.inner),
            job,
        };
        self.inner.tracker.spawn_on(
            async move {
                let guard = guard;
                let run = AssertUnwindSafe(guard.inner.pipeline.run(&guard.job)).catch_unwind();
                if let Err(payload) = run.await {
                    let message = panic_message(&*payload);
                    tracing::error!(job_id = %id, panic = %message, "Scan task panicked");
                    let error = EngineError::internal(format!("scan task panicked: {message}"));
                    if guard.job.fail(&error) {
                        crate::audit::emit_job_finished(&guard.job.snapshot());
                    }
                }
            },
            &handle,
        );

        Ok(id)
    }

    /// Returns a snapshot of the job with `id`.
    pub fn get(&self, id: JobId) -> EngineResult<JobSnapshot> {
        self.job(id).map(|job| job.snapshot())
    }

    /// Returns the live job with `id`.
    pub fn job(&self, id: JobId) -> EngineResult<Arc<ScanJob>> {
        self.inner
            .jobs
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::not_found(id))
    }

    /// Cancels the job with `id` and waits for it to reach a terminal
    /// state. Cancelling a terminal job changes nothing.
    pub async fn cancel(&self, id: JobId) -> EngineResult<JobSnapshot> {
        let job = self.job(id)?;
        if !job.is_terminal() {
            tracing::info!(job_id = %id, domain = %job.domain(), "Cancelling scan");
            job.cancellation_token().cancel();
            // A job cancelled before its task started never reaches the
            // pipeline's select, so fail it here as well.
            if job.state() == JobState::Pending {
                job.fail(&EngineError::Cancelled);
            }
            job.wait().await;
        }
        Ok(job.snapshot())
    }

    /// Cancels every job and waits for all job tasks to finish.
    pub async fn shutdown(&self) {
        tracing::info!(jobs = self.inner.jobs.len(), "Shutting down job registry");
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }

    /// Number of jobs that are not yet terminal.
    pub fn active_count(&self) -> usize {
        self.inner.slots.active_count()
    }

    /// Number of jobs currently held, terminal ones included.
    pub fn len(&self) -> usize {
        self.inner.jobs.len()
    }

    /// Returns `true` if the registry holds no jobs.
    pub fn is_empty(&self) -> bool {
        self.inner.jobs.is_empty()
    }

    /// Returns the registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }
}

/// Owned by a job's task. Settles the job, frees its slot and retires it
/// when the task ends, whether it returned, panicked or was dropped.
struct JobTaskGuard {
    inner: Arc<RegistryInner>,
    job: Arc<ScanJob>,
}

impl Drop for JobTaskGuard {
    fn drop(&mut self) {
        if self
            .job
            .fail(&EngineError::internal("scan task ended before the job settled"))
        {
            crate::audit::emit_job_finished(&self.job.snapshot());
        }
        self.inner.slots.release();
        self.inner.retire(self.job.id());
    }
}

impl RegistryInner {
    /// Records `id` as terminal and evicts the oldest terminal jobs beyond
    /// the retention limit.
    fn retire(&self, id: JobId) {
        let evicted: Vec<JobId> = {
            let mut finished = self
                .finished
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            finished.push_back(id);
            let excess = finished.len().saturating_sub(self.config.retain_completed);
            finished.drain(..excess).collect()
        };

        for old in evicted {
            if let Some((_, job)) = self.jobs.remove(&old) {
                crate::audit::emit_job_evicted(old, job.domain());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{MockProbe, MockSource};
    use crate::core::{ProbeError, ProbeTarget, ResultRecord, SourceError};
    use crate::job::StageWeights;
    use crate::manager::RetryConfig;
    use std::time::Duration;

    #[derive(Debug)]
    struct ExplodingProbe;

    #[async_trait::async_trait]
    impl Probe for ExplodingProbe {
        fn name(&self) -> &str {
            "exploding"
        }

        async fn probe(&self, target: &ProbeTarget) -> Result<Option<ResultRecord>, ProbeError> {
            if target.subdomain == "b.example.com" {
                panic!("resolver state corrupted");
            }
            Ok(Some(ResultRecord::new(&target.subdomain).with_http_status(200)))
        }
    }

    async fn wait_idle(registry: &JobRegistry) {
        for _ in 0..100 {
            if registry.active_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    fn registry_with(source: MockSource, probe: MockProbe) -> JobRegistry {
        JobRegistry::builder()
            .add_source(source)
            .add_probe(probe)
            .with_pipeline_config(PipelineConfig::default().with_retry(RetryConfig::no_retry()))
            .build()
            .unwrap()
    }

    async fn wait_terminal(registry: &JobRegistry, id: JobId) -> JobSnapshot {
        registry.job(id).unwrap().wait().await;
        registry.get(id).unwrap()
    }

    #[test]
    fn test_build_requires_source() {
        let result = JobRegistry::builder().build();
        assert!(matches!(result, Err(EngineError::Configuration { .. })));
    }

    #[test]
    fn test_build_rejects_zero_limits() {
        for config in [
            RegistryConfig::new().with_max_active_jobs(0),
            RegistryConfig::new().with_retain_completed(0),
        ] {
            let result = JobRegistry::builder()
                .add_source(MockSource::new(["a.example.com"]))
                .with_config(config)
                .build();
            assert!(matches!(result, Err(EngineError::Configuration { .. })));
        }
    }

    #[test]
    fn test_create_without_runtime_is_configuration_error() {
        let registry = registry_with(MockSource::new(["a.example.com"]), MockProbe::new());
        let result = registry.create("example.com");
        assert!(matches!(result, Err(EngineError::Configuration { .. })));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_domain() {
        let registry = registry_with(MockSource::new(["a.example.com"]), MockProbe::new());
        for input in ["", "   ", "localhost", "exa mple.com"] {
            assert!(matches!(
                registry.create(input),
                Err(EngineError::InvalidInput { .. })
            ));
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_create_returns_before_scan_finishes() {
        let registry = registry_with(
            MockSource::new(["www.example.com"]).with_latency(Duration::from_millis(200)),
            MockProbe::new(),
        );

        let id = registry.create("Example.COM").unwrap();
        let snapshot = registry.get(id).unwrap();
        assert!(!snapshot.is_terminal());
        assert_eq!(snapshot.domain, "example.com");

        let done = wait_terminal(&registry, id).await;
        assert_eq!(done.state, JobState::Completed);
        assert_eq!(done.progress, 100);
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_not_found() {
        let registry = registry_with(MockSource::new(["a.example.com"]), MockProbe::new());
        assert!(matches!(
            registry.get(JobId::new()),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_while_polling() {
        let registry = registry_with(
            MockSource::new((0..20).map(|i| format!("host{i}.example.com"))),
            MockProbe::new()
                .with_default_record(ResultRecord::new("").with_http_status(200))
                .with_latency(Duration::from_millis(5)),
        );
        let id = registry.create("example.com").unwrap();

        let mut last = 0;
        loop {
            let snapshot = registry.get(id).unwrap();
            assert!(snapshot.progress >= last);
            if snapshot.is_terminal() {
                assert_eq!(snapshot.progress, 100);
                break;
            }
            assert!(snapshot.progress < 100);
            last = snapshot.progress;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test]
    async fn test_terminal_snapshots_are_stable() {
        let registry = registry_with(
            MockSource::new(["a.example.com", "b.example.com"]),
            MockProbe::new().with_default_record(ResultRecord::new("").with_http_status(301)),
        );
        let id = registry.create("example.com").unwrap();
        let first = wait_terminal(&registry, id).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = registry.get(id).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failing_sources_fail_job() {
        let registry = registry_with(
            MockSource::failing(SourceError::unavailable("mock", "HTTP 503")),
            MockProbe::new(),
        );
        let id = registry.create("example.com").unwrap();
        let snapshot = wait_terminal(&registry, id).await;
        assert_eq!(snapshot.state, JobState::Failed);
        assert!(snapshot.error.is_some());
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_capacity_limit() {
        let registry = JobRegistry::builder()
            .add_source(MockSource::new(["a.example.com"]).with_latency(Duration::from_secs(30)))
            .with_config(RegistryConfig::new().with_max_active_jobs(1))
            .build()
            .unwrap();

        let first = registry.create("example.com").unwrap();
        assert!(matches!(
            registry.create("example.org"),
            Err(EngineError::CapacityExceeded { limit: 1 })
        ));

        registry.cancel(first).await.unwrap();
        // The slot is released by the job task after the job turns terminal.
        wait_idle(&registry).await;
        assert!(registry.create("example.org").is_ok());
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let registry = registry_with(
            MockSource::new(["a.example.com"]),
            MockProbe::new().with_latency(Duration::from_secs(30)),
        );
        let id = registry.create("example.com").unwrap();

        let snapshot = registry.cancel(id).await.unwrap();
        assert_eq!(snapshot.state, JobState::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("scan was cancelled"));

        // Cancelling again is a no-op.
        let again = registry.cancel(id).await.unwrap();
        assert_eq!(again, snapshot);
    }

    #[tokio::test]
    async fn test_completed_jobs_are_evicted_oldest_first() {
        let registry = JobRegistry::builder()
            .add_source(MockSource::new(["a.example.com"]))
            .with_config(RegistryConfig::new().with_retain_completed(2))
            .build()
            .unwrap();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = registry.create("example.com").unwrap();
            wait_terminal(&registry, id).await;
            ids.push(id);
        }
        // Retirement runs on the job task right after the terminal transition.
        for _ in 0..100 {
            if registry.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert!(matches!(registry.get(ids[0]), Err(EngineError::NotFound { .. })));
        assert!(registry.get(ids[1]).is_ok());
        assert!(registry.get(ids[2]).is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_running_jobs() {
        let registry = registry_with(
            MockSource::new(["a.example.com"]),
            MockProbe::new().with_latency(Duration::from_secs(30)),
        );
        let id = registry.create("example.com").unwrap();

        registry.shutdown().await;

        assert_eq!(registry.get(id).unwrap().state, JobState::Failed);
        assert!(registry.create("example.com").is_err());
    }

    #[tokio::test]
    async fn test_concurrent_jobs_are_isolated() {
        let registry = JobRegistry::builder()
            .add_source(MockSource::new([
                "www.example.com",
                "www.example.org",
                "api.example.org",
            ]))
            .add_probe(MockProbe::new().with_default_record(ResultRecord::new("").with_http_status(200)))
            .build()
            .unwrap();

        let com = registry.create("example.com").unwrap();
        let org = registry.create("example.org").unwrap();

        let com = wait_terminal(&registry, com).await;
        let org = wait_terminal(&registry, org).await;

        assert_eq!(com.results.len(), 1);
        assert_eq!(org.results.len(), 2);
        assert!(org.results.iter().all(|r| r.subdomain.ends_with(".example.org")));
    }

    #[tokio::test]
    async fn test_panicking_probe_does_not_strand_job() {
        let registry = JobRegistry::builder()
            .add_source(MockSource::new(["a.example.com", "b.example.com"]))
            .add_probe(ExplodingProbe)
            .with_config(RegistryConfig::new().with_max_active_jobs(1))
            .build()
            .unwrap();
        let id = registry.create("example.com").unwrap();

        let snapshot = tokio::time::timeout(Duration::from_secs(5), wait_terminal(&registry, id))
            .await
            .unwrap();
        assert_eq!(snapshot.state, JobState::Completed);
        assert_eq!(snapshot.results[0].http_status, Some(200));
        assert!(snapshot.results[1].http_status.is_none());

        wait_idle(&registry).await;
        assert_eq!(registry.active_count(), 0);
        let next = registry.create("example.org").unwrap();
        let cancelled = tokio::time::timeout(Duration::from_secs(5), registry.cancel(next))
            .await
            .unwrap()
            .unwrap();
        assert!(cancelled.is_terminal());
    }

    #[tokio::test]
    async fn test_task_guard_settles_abandoned_job() {
        let registry = registry_with(MockSource::new(["a.example.com"]), MockProbe::new());
        let job = Arc::new(ScanJob::new(
            "example.com",
            StageWeights::default(),
            CancellationToken::new(),
        ));
        registry.inner.jobs.insert(job.id(), Arc::clone(&job));
        assert!(registry.inner.slots.acquire());
        job.start();

        drop(JobTaskGuard {
            inner: Arc::clone(&registry.inner),
            job: Arc::clone(&job),
        });

        assert_eq!(job.state(), JobState::Failed);
        assert!(job
            .snapshot()
            .error
            .unwrap()
            .contains("scan task ended before the job settled"));
        assert_eq!(registry.active_count(), 0);
        assert_eq!(job.wait().await, JobState::Failed);
    }
}
