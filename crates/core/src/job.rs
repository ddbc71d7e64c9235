//! Batch job state as reported by the gateway.

use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

/// Lifecycle status of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Uploaded but not yet started.
    Pending,
    /// The gateway is processing the job's records.
    Running,
    /// All records processed.
    Completed,
    /// Processing aborted with an error.
    Failed,
}

impl JobStatus {
    /// Whether the job is still producing progress updates.
    pub fn is_running(self) -> bool {
        matches!(self, JobStatus::Running)
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// A server-tracked unit of batch work with status and progress counters.
///
/// `PartialEq` is structural and drives the snapshot reconciliation check:
/// a freshly fetched job list only replaces local state when it compares
/// unequal to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Completion percentage, 0..=100.
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub processed_records: u64,
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub valid_records: u64,
    #[serde(default)]
    pub invalid_records: u64,
    #[serde(default)]
    pub suspicious_records: u64,
    pub created_at: Timestamp,
}
