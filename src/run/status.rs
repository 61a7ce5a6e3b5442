use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::RUN_ID_PREFIX;

/// Time a run stays queued before it starts running.
pub const QUEUED_DELAY_MS: i64 = 2_000;

// Running lasts RUNNING_BASE_MS plus 0..RUNNING_SPREAD whole seconds.
const RUNNING_BASE_MS: i64 = 5_000;
const RUNNING_SPREAD: u32 = 6;

// One residue class out of five fails; 15 of the 64 id symbols land in it.
const FAILURE_MODULUS: u32 = 5;

/// The four states of a run.
///
/// Each run flows through: QUEUED → RUNNING → SUCCEEDED | FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }

    /// Position in the linear progression. Both terminal states share the last rank.
    pub fn rank(&self) -> u8 {
        match self {
            RunStatus::Queued => 0,
            RunStatus::Running => 1,
            RunStatus::Succeeded | RunStatus::Failed => 2,
        }
    }

    /// Compute the transition from `self` towards `target`.
    ///
    /// Runs only move forward: a terminal status never changes and a target
    /// at or behind the current rank leaves the status untouched.
    pub fn advance_to(self, target: RunStatus) -> Transition {
        if self.is_terminal() || target.rank() <= self.rank() {
            Transition::Unchanged(self)
        } else {
            Transition::Advance {
                from: self,
                to: target,
            }
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Queued => write!(f, "QUEUED"),
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::Succeeded => write!(f, "SUCCEEDED"),
            RunStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// The result of evaluating a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The run keeps its current status.
    Unchanged(RunStatus),
    /// The run moves forward to a later status.
    Advance { from: RunStatus, to: RunStatus },
}

/// Reload-stable schedule of a single run, derived from its identifier.
///
/// The running duration comes from the last character of the id and the
/// outcome from the first character after the `run_` prefix, so the same id
/// always yields the same timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTimeline {
    transition_ms: i64,
    outcome: RunStatus,
}

impl StatusTimeline {
    pub fn for_run(run_id: &str) -> Self {
        let last = run_id.chars().last().map(u32::from).unwrap_or(0);
        let first = run_id
            .strip_prefix(RUN_ID_PREFIX)
            .unwrap_or(run_id)
            .chars()
            .next()
            .map(u32::from)
            .unwrap_or(0);

        let running_ms = RUNNING_BASE_MS + i64::from(last % RUNNING_SPREAD) * 1_000;
        let outcome = if first % FAILURE_MODULUS == 0 {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };

        Self {
            transition_ms: QUEUED_DELAY_MS + running_ms,
            outcome,
        }
    }

    /// Elapsed time after which the run is terminal.
    pub fn transition_ms(&self) -> i64 {
        self.transition_ms
    }

    pub fn outcome(&self) -> RunStatus {
        self.outcome
    }

    /// Expected status `elapsed_ms` after creation.
    pub fn status_at(&self, elapsed_ms: i64) -> RunStatus {
        if elapsed_ms < QUEUED_DELAY_MS {
            RunStatus::Queued
        } else if elapsed_ms < self.transition_ms {
            RunStatus::Running
        } else {
            self.outcome
        }
    }

    /// Milliseconds from `elapsed_ms` until the next status change, or `None`
    /// once the timeline has reached its terminal status.
    pub fn until_next_change(&self, elapsed_ms: i64) -> Option<i64> {
        if elapsed_ms < QUEUED_DELAY_MS {
            Some(QUEUED_DELAY_MS - elapsed_ms)
        } else if elapsed_ms < self.transition_ms {
            Some(self.transition_ms - elapsed_ms)
        } else {
            None
        }
    }
}
