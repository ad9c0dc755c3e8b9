//! The poll adapter: the payload a client sees while a scan runs.
//!
//! Three shapes, told apart by their fields:
//!
//! ```text
//! in progress  {"progress": 40, "status": "probing", "subdomains": [...]}
//! completed    {"status": "completed", "count": 2, "subdomains": [...]}
//! failed       {"status": "error", "error": "..."}
//! ```

use crate::core::{EngineResult, JobId, JobState, ResultRecord, Stage};
use crate::job::JobSnapshot;
use crate::manager::JobRegistry;

use serde::Serialize;

/// Status token of a completed job.
pub const STATUS_COMPLETED: &str = "completed";

/// Status token of a failed job.
pub const STATUS_ERROR: &str = "error";

/// What a poller receives for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PollResponse {
    /// The job is pending or running.
    InProgress {
        /// Progress percentage, below 100.
        progress: u8,
        /// Stage token such as `"probing"`.
        status: String,
        /// Records found so far.
        subdomains: Vec<ResultRecord>,
    },
    /// The job completed.
    Completed {
        /// Always `"completed"`.
        status: String,
        /// Number of records.
        count: usize,
        /// Final records in first-seen order.
        subdomains: Vec<ResultRecord>,
    },
    /// The job failed.
    Failed {
        /// Always `"error"`.
        status: String,
        /// Failure description.
        error: String,
    },
}

impl From<JobSnapshot> for PollResponse {
    fn from(snapshot: JobSnapshot) -> Self {
        match snapshot.state {
            JobState::Pending => PollResponse::InProgress {
                progress: 0,
                status: Stage::Starting.as_str().to_string(),
                subdomains: Vec::new(),
            },
            JobState::Running => PollResponse::InProgress {
                progress: snapshot.progress,
                status: snapshot.stage.as_str().to_string(),
                subdomains: snapshot.results,
            },
            JobState::Completed => PollResponse::Completed {
                status: STATUS_COMPLETED.to_string(),
                count: snapshot.results.len(),
                subdomains: snapshot.results,
            },
            JobState::Failed => PollResponse::Failed {
                status: STATUS_ERROR.to_string(),
                error: snapshot
                    .error
                    .unwrap_or_else(|| "scan failed".to_string()),
            },
        }
    }
}

impl PollResponse {
    /// Returns `true` once the client can stop polling.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollResponse::InProgress { .. })
    }

    /// Serializes the payload.
    pub fn to_json(&self) -> EngineResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Builds the poll payload for job `id`.
///
/// Fails with `NotFound` for unknown or evicted ids. Never changes the job.
pub fn poll(registry: &JobRegistry, id: JobId) -> EngineResult<PollResponse> {
    let snapshot = registry.get(id)?;
    tracing::trace!(
        job_id = %id,
        state = %snapshot.state,
        progress = snapshot.progress,
        "Polled scan"
    );
    Ok(PollResponse::from(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{MockProbe, MockSource};
    use crate::core::{EngineError, SourceError};
    use crate::job::{ScanJob, StageWeights};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn job() -> ScanJob {
        ScanJob::new("example.com", StageWeights::default(), CancellationToken::new())
    }

    #[test]
    fn test_pending_job_is_starting() {
        let response = PollResponse::from(job().snapshot());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"progress": 0, "status": "starting", "subdomains": []})
        );
        assert!(!response.is_terminal());
    }

    #[test]
    fn test_running_job_reports_stage_and_partial_results() {
        let job = job();
        job.start();
        job.begin_stage(Stage::Probing, 2);
        job.store()
            .upsert(ResultRecord::new("www.example.com").with_http_status(200));

        let value = serde_json::to_value(PollResponse::from(job.snapshot())).unwrap();
        assert_eq!(value["status"], "probing");
        assert_eq!(value["progress"], 40);
        assert_eq!(value["subdomains"][0]["subdomain"], "www.example.com");
        assert_eq!(value["subdomains"][0]["http_status"], 200);
        assert_eq!(value["subdomains"][0]["cloudflare"], "Unknown");
    }

    #[test]
    fn test_completed_and_failed_shapes() {
        let done = job();
        done.start();
        done.store().upsert(ResultRecord::new("a.example.com"));
        done.complete();
        let value = serde_json::to_value(PollResponse::from(done.snapshot())).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["count"], 1);
        assert!(value.get("progress").is_none());

        let failed = job();
        failed.start();
        failed.fail(&EngineError::orchestration("every candidate source failed"));
        assert_eq!(
            serde_json::to_value(PollResponse::from(failed.snapshot())).unwrap(),
            serde_json::json!({"status": "error", "error": "scan failed: every candidate source failed"})
        );
    }

    #[tokio::test]
    async fn test_immediate_poll_is_not_terminal() {
        let registry = JobRegistry::builder()
            .add_source(MockSource::new(["www.example.com"]).with_latency(Duration::from_millis(50)))
            .build()
            .unwrap();

        let id = registry.create("example.com").unwrap();
        match poll(&registry, id).unwrap() {
            PollResponse::InProgress { progress, .. } => assert!(progress < 100),
            other => panic!("expected in-progress response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_terminal_polls_are_byte_identical() {
        let registry = JobRegistry::builder()
            .add_source(MockSource::new(["www.example.com", "api.example.com"]))
            .add_probe(MockProbe::new().with_default_record(ResultRecord::new("").with_https_status(200)))
            .build()
            .unwrap();

        let id = registry.create("example.com").unwrap();
        registry.job(id).unwrap().wait().await;

        let first = poll(&registry, id).unwrap().to_json().unwrap();
        let second = poll(&registry, id).unwrap().to_json().unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failed_enumeration_polls_as_error() {
        let registry = JobRegistry::builder()
            .add_source(MockSource::failing(SourceError::unavailable("mock", "down")))
            .with_pipeline_config(
                crate::manager::PipelineConfig::default()
                    .with_retry(crate::manager::RetryConfig::no_retry()),
            )
            .build()
            .unwrap();

        let id = registry.create("example.com").unwrap();
        registry.job(id).unwrap().wait().await;

        match poll(&registry, id).unwrap() {
            PollResponse::Failed { status, error } => {
                assert_eq!(status, "error");
                assert!(!error.is_empty());
            }
            other => panic!("expected failed response, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let registry = JobRegistry::builder()
            .add_source(MockSource::new(["a.example.com"]))
            .build()
            .unwrap();
        assert!(matches!(
            poll(&registry, JobId::new()),
            Err(EngineError::NotFound { .. })
        ));
    }
}
