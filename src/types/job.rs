//! Batch-scheduler job types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a batch job.
///
/// Transitions are linear and one-shot:
/// `Pending → Running → {Completed, Failed, Cancelled}`, plus
/// `Pending → Cancelled` for jobs cancelled before execution starts.
/// Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the allowed-edge set permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Cancelled)
                | (Self::Running, Self::Completed | Self::Failed | Self::Cancelled)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Advisory scheduling priority. Higher drains first when worker capacity
/// frees; submission never blocks on priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    Normal,
    High,
}

impl Default for JobPriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Options accepted at job submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default = "default_true")]
    pub use_conservative: bool,
    #[serde(default = "default_true")]
    pub log_compliance: bool,
    /// Chunk size for progress granularity, bounded to [10, 1000].
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub priority: JobPriority,
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    100
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            use_conservative: true,
            log_compliance: true,
            chunk_size: default_chunk_size(),
            priority: JobPriority::Normal,
        }
    }
}

impl JobOptions {
    /// Chunk size clamped to the supported bounds.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(10, 1000)
    }
}

/// Monotone progress counters for a job. `processed` never decreases.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobProgress {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Point-in-time view of a job, cloned out under the scheduler lock for
/// status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub priority: JobPriority,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Validation or execution notes accumulated by the job.
    pub errors: Vec<String>,
}
