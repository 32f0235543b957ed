//! Job lifecycle types shared by the queue, the experiment runner and the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job lifecycle state.
///
/// `queued → running → {completed, failed}`. `NotFound` is only ever a query
/// answer, never a stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    NotFound,
}

impl JobStatus {
    /// Completed and failed jobs never transition again.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a task fault, so failed results are diagnosable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultCategory {
    Validation,
    SolverNonConvergence,
    Inference,
    Storage,
    Unknown,
}

impl std::fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::SolverNonConvergence => "solver_non_convergence",
            Self::Inference => "inference",
            Self::Storage => "storage",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A fault captured at the task boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct JobFault {
    pub category: FaultCategory,
    pub message: String,
}

impl JobFault {
    pub fn new(category: FaultCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FaultCategory::Unknown, message)
    }

    /// Convert a caught panic payload into a fault.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::unknown(format!("task panicked: {detail}"))
    }
}

/// Point-in-time view of a job as seen by a poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub status: JobStatus,
    pub progress: f64,
    pub message: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl JobStatusReport {
    pub fn not_found() -> Self {
        Self {
            status: JobStatus::NotFound,
            progress: 0.0,
            message: "Job not found".to_string(),
            created_at: None,
        }
    }
}
