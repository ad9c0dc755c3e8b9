//! The scan job state machine.

use crate::core::{EngineError, JobId, JobState, ResultRecord, Stage};
use crate::job::progress::{ProgressTracker, StageWeights, MAX_RUNNING_PROGRESS};
use crate::store::ResultStore;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::RwLock;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Mutable part of a job, guarded by one lock.
#[derive(Debug, Clone)]
struct JobStatus {
    state: JobState,
    progress: u8,
    tracker: ProgressTracker,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// One scan of one domain.
///
/// Owns its [`ResultStore`]. State changes go through the transition
/// methods, which refuse anything the lifecycle does not allow, so a
/// terminal job stays terminal no matter who calls what afterwards.
#[derive(Debug)]
pub struct ScanJob {
    id: JobId,
    domain: String,
    created_at: DateTime<Utc>,
    status: RwLock<JobStatus>,
    store: ResultStore,
    cancel: CancellationToken,
    state_tx: watch::Sender<JobState>,
}

impl ScanJob {
    /// Creates a `Pending` job for an already-normalized domain.
    pub fn new(domain: impl Into<String>, weights: StageWeights, cancel: CancellationToken) -> Self {
        let (state_tx, _) = watch::channel(JobState::Pending);
        Self {
            id: JobId::new(),
            domain: domain.into(),
            created_at: Utc::now(),
            status: RwLock::new(JobStatus {
                state: JobState::Pending,
                progress: 0,
                tracker: ProgressTracker::new(weights),
                error: None,
                started_at: None,
                completed_at: None,
            }),
            store: ResultStore::new(),
            cancel,
            state_tx,
        }
    }

    /// The job identifier.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// The target domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// When the job was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The job's result store.
    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Token that is cancelled when the job must stop dispatching work.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        self.read_status().state
    }

    /// Returns `true` once the job is `Completed` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Current progress percentage.
    pub fn progress(&self) -> u8 {
        self.read_status().progress
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.read_status().tracker.stage()
    }

    /// `Pending -> Running`. Returns `false` if the job was not pending.
    pub fn start(&self) -> bool {
        let started = {
            let mut status = self.write_status();
            if !status.state.can_transition_to(JobState::Running) {
                false
            } else {
                status.state = JobState::Running;
                status.started_at = Some(Utc::now());
                true
            }
        };
        if started {
            self.state_tx.send_replace(JobState::Running);
        }
        started
    }

    /// Enters `stage` with `total_units` of work. Ignored unless running.
    pub fn begin_stage(&self, stage: Stage, total_units: u64) {
        let mut status = self.write_status();
        if status.state != JobState::Running {
            return;
        }
        status.tracker.begin(stage, total_units);
        Self::refresh_progress(&mut status);
    }

    /// Marks `units` of the current stage as finished. Ignored unless running.
    pub fn advance(&self, units: u64) {
        let mut status = self.write_status();
        if status.state != JobState::Running {
            return;
        }
        status.tracker.advance(units);
        Self::refresh_progress(&mut status);
    }

    fn refresh_progress(status: &mut JobStatus) {
        let computed = status.tracker.percent().min(MAX_RUNNING_PROGRESS);
        status.progress = status.progress.max(computed);
    }

    /// `Running -> Completed`, setting progress to 100.
    ///
    /// Must only be called after every dispatched probe has returned.
    pub fn complete(&self) -> bool {
        let completed = {
            let mut status = self.write_status();
            if !status.state.can_transition_to(JobState::Completed) {
                false
            } else {
                status.tracker.begin(Stage::Finished, 0);
                status.progress = 100;
                status.state = JobState::Completed;
                status.completed_at = Some(Utc::now());
                true
            }
        };
        if completed {
            self.state_tx.send_replace(JobState::Completed);
        }
        completed
    }

    /// `Pending | Running -> Failed`. Progress and stage are left where the
    /// failure happened; collected results are kept.
    pub fn fail(&self, error: &EngineError) -> bool {
        let failed = {
            let mut status = self.write_status();
            if !status.state.can_transition_to(JobState::Failed) {
                false
            } else {
                status.state = JobState::Failed;
                status.error = Some(error.to_string());
                status.completed_at = Some(Utc::now());
                true
            }
        };
        if failed {
            self.cancel.cancel();
            self.state_tx.send_replace(JobState::Failed);
        }
        failed
    }

    /// Waits until the job reaches a terminal state and returns it.
    pub async fn wait(&self) -> JobState {
        let mut rx = self.state_tx.subscribe();
        let state = match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            // The sender lives as long as `self`, so this is unreachable in practice.
            Err(_) => self.state(),
        };
        state
    }

    /// Returns a consistent copy of the job's status and results.
    ///
    /// Status is read first. Once a job is terminal its store no longer
    /// changes, so a terminal snapshot always carries the final result set.
    pub fn snapshot(&self) -> JobSnapshot {
        let status = self.read_status().clone();
        let results = self.store.snapshot();
        JobSnapshot {
            id: self.id,
            domain: self.domain.clone(),
            state: status.state,
            progress: status.progress,
            stage: status.tracker.stage(),
            error: status.error,
            created_at: self.created_at,
            started_at: status.started_at,
            completed_at: status.completed_at,
            results,
        }
    }

    fn read_status(&self) -> std::sync::RwLockReadGuard<'_, JobStatus> {
        self.status
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_status(&self) -> std::sync::RwLockWriteGuard<'_, JobStatus> {
        self.status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Immutable, point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    /// Job identifier.
    pub id: JobId,
    /// Target domain.
    pub domain: String,
    /// Lifecycle state.
    pub state: JobState,
    /// Progress percentage.
    pub progress: u8,
    /// Current stage.
    pub stage: Stage,
    /// Failure description, only set when `state` is `Failed`.
    pub error: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// When enumeration started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Results in first-seen order.
    pub results: Vec<ResultRecord>,
}

impl JobSnapshot {
    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Wall-clock duration from creation to termination, if terminated.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|done| done - self.created_at)
    }

    /// Number of results that answered an HTTP probe.
    pub fn active_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_active()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ScanJob {
        ScanJob::new("example.com", StageWeights::default(), CancellationToken::new())
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = job();
        let snapshot = job.snapshot();
        assert_eq!(snapshot.state, JobState::Pending);
        assert_eq!(snapshot.progress, 0);
        assert_eq!(snapshot.stage, Stage::Starting);
        assert!(snapshot.error.is_none());
        assert!(snapshot.results.is_empty());
    }

    #[test]
    fn test_happy_path_transitions() {
        let job = job();
        assert!(job.start());
        assert!(!job.start());

        job.begin_stage(Stage::Probing, 4);
        job.advance(2);
        assert_eq!(job.progress(), 65);

        assert!(job.complete());
        let snapshot = job.snapshot();
        assert_eq!(snapshot.state, JobState::Completed);
        assert_eq!(snapshot.progress, 100);
        assert!(snapshot.completed_at.is_some());
    }

    #[test]
    fn test_running_progress_never_reaches_100() {
        let job = job();
        job.start();
        job.begin_stage(Stage::Classification, 1);
        job.advance(1);
        assert_eq!(job.progress(), MAX_RUNNING_PROGRESS);
        assert_eq!(job.state(), JobState::Running);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let job = job();
        job.start();
        job.begin_stage(Stage::Probing, 2);
        job.advance(2);
        let high = job.progress();

        // Re-entering an earlier stage must not move progress backwards.
        job.begin_stage(Stage::PassiveEnumeration, 10);
        assert_eq!(job.progress(), high);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let job = job();
        job.start();
        assert!(job.fail(&EngineError::orchestration("every candidate source failed")));
        assert!(!job.complete());
        assert!(!job.fail(&EngineError::Cancelled));

        let snapshot = job.snapshot();
        assert_eq!(snapshot.state, JobState::Failed);
        assert_eq!(
            snapshot.error.as_deref(),
            Some("scan failed: every candidate source failed")
        );
        assert!(job.cancellation_token().is_cancelled());
    }

    #[test]
    fn test_complete_requires_running() {
        let job = job();
        assert!(!job.complete());
        assert_eq!(job.state(), JobState::Pending);
    }

    #[test]
    fn test_failed_job_keeps_partial_results() {
        let job = job();
        job.start();
        job.store().upsert(ResultRecord::new("www.example.com"));
        job.fail(&EngineError::Cancelled);

        let snapshot = job.snapshot();
        assert_eq!(snapshot.results.len(), 1);
        assert_eq!(snapshot.error.as_deref(), Some("scan was cancelled"));
    }

    #[tokio::test]
    async fn test_wait_returns_terminal_state() {
        let job = std::sync::Arc::new(job());
        let waiter = {
            let job = std::sync::Arc::clone(&job);
            tokio::spawn(async move { job.wait().await })
        };
        job.start();
        job.complete();
        assert_eq!(waiter.await.unwrap(), JobState::Completed);
    }
}
