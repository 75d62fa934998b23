//! Typed job lifecycle status.
//!
//! The job record store persists the status as text, so the enum carries
//! its canonical lowercase names rather than lookup-table ids.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an analysis job.
///
/// Transitions are `Pending → Running → {Completed | Failed}`; the two
/// terminal states are never left. The runner is the only component that
/// performs transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Canonical status text as stored in the job record.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether this status ends the job lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
