//! Stage-weighted progress accounting.
//!
//! Each stage owns a slice of the 0–100 range. Within a stage, progress is
//! the ratio of finished work units to dispatched ones, rescaled into that
//! slice. A running job never reports more than [`MAX_RUNNING_PROGRESS`];
//! 100 is reserved for `Completed`.

use crate::core::{EngineError, EngineResult, Stage};

/// Highest value a non-terminal job may report.
pub const MAX_RUNNING_PROGRESS: u8 = 99;

/// Progress ranges per stage, as `(start, end)` percentages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageWeights {
    /// Passive candidate sources.
    pub passive: (u8, u8),
    /// Active candidate sources.
    pub active: (u8, u8),
    /// Resolution and HTTP(S) probes.
    pub probing: (u8, u8),
    /// Classification probes.
    pub classification: (u8, u8),
}

impl Default for StageWeights {
    fn default() -> Self {
        // Enumeration 0-40, probing 40-90, classification 90-100.
        Self {
            passive: (0, 30),
            active: (30, 40),
            probing: (40, 90),
            classification: (90, 100),
        }
    }
}

impl StageWeights {
    /// Returns the `(start, end)` range of `stage`.
    pub fn range(&self, stage: Stage) -> (u8, u8) {
        match stage {
            Stage::Starting => (0, 0),
            Stage::PassiveEnumeration => self.passive,
            Stage::ActiveEnumeration => self.active,
            Stage::Probing => self.probing,
            Stage::Classification => self.classification,
            Stage::Finished => (100, 100),
        }
    }

    /// Checks that the ranges are well-formed, ordered and within 0–100.
    pub fn validate(&self) -> EngineResult<()> {
        let ranges = [
            ("passive", self.passive),
            ("active", self.active),
            ("probing", self.probing),
            ("classification", self.classification),
        ];

        let mut floor = 0u8;
        for (name, (start, end)) in ranges {
            if start > end || end > 100 {
                return Err(EngineError::configuration(format!(
                    "stage weight '{name}' has invalid range {start}..{end}"
                )));
            }
            if start < floor {
                return Err(EngineError::configuration(format!(
                    "stage weight '{name}' starts at {start}, before the previous stage ends at {floor}"
                )));
            }
            floor = end;
        }
        Ok(())
    }
}

/// Unit counter for the current stage.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    weights: StageWeights,
    stage: Stage,
    total: u64,
    done: u64,
}

impl ProgressTracker {
    /// Creates a tracker positioned at `Stage::Starting`.
    pub fn new(weights: StageWeights) -> Self {
        Self {
            weights,
            stage: Stage::Starting,
            total: 0,
            done: 0,
        }
    }

    /// Moves to `stage` with `total` units of work.
    pub fn begin(&mut self, stage: Stage, total: u64) {
        self.stage = stage;
        self.total = total;
        self.done = 0;
    }

    /// Records `units` finished units. Never counts past the total.
    pub fn advance(&mut self, units: u64) {
        self.done = self.done.saturating_add(units).min(self.total);
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Raw percentage for the current position, before running clamps.
    ///
    /// A stage with no work counts as finished.
    pub fn percent(&self) -> u8 {
        let (start, end) = self.weights.range(self.stage);
        if self.total == 0 {
            return end;
        }
        let span = u64::from(end - start);
        let within = span * self.done / self.total;
        start + within as u8
    }
}
