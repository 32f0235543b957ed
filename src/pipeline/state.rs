//! Application state shared by the HTTP handlers and the worker pool.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::runner::run_experiment_task;
use crate::engine::{explain_run, Explanation};
use crate::jobs::{JobQueue, JobQueueError};
use crate::ml_engine::ModelCache;
use crate::optimization::OptimizerSettings;
use crate::storage::{ExperimentRecord, ExperimentStore, StoreError};
use crate::types::{
    ExperimentResults, FaultCategory, JobStatus, JobStatusReport, ValidationError,
};

/// Errors surfaced by the experiment lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] JobQueueError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
}

/// Poll response for a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Final result of a job, joined with its submission time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub job_id: String,
    pub status: JobStatus,
    pub results: Option<ExperimentResults>,
    pub error: Option<String>,
    pub error_category: Option<FaultCategory>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
}

/// Shared state. Cheap to clone; every field is reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<JobQueue>,
    pub store: Arc<dyn ExperimentStore>,
    pub models: Arc<ModelCache>,
    pub optimizer: OptimizerSettings,
}

impl AppState {
    pub fn new(
        queue: Arc<JobQueue>,
        store: Arc<dyn ExperimentStore>,
        models: Arc<ModelCache>,
        optimizer: OptimizerSettings,
    ) -> Self {
        Self {
            queue,
            store,
            models,
            optimizer,
        }
    }

    /// Validate, persist and enqueue an experiment. Returns the new job id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, params: crate::types::ExperimentParams) -> Result<String, PipelineError> {
        params.validate()?;

        let job_id = Uuid::new_v4().to_string();
        self.store
            .create_experiment(&ExperimentRecord::queued(job_id.clone(), params.clone()))?;

        let store = Arc::clone(&self.store);
        let models = Arc::clone(&self.models);
        let optimizer = self.optimizer;
        let task_id = job_id.clone();
        self.queue.enqueue(job_id.clone(), move |reporter| {
            run_experiment_task(&task_id, &params, &models, &optimizer, store.as_ref(), &reporter)
        })?;

        info!(job_id = %job_id, "Experiment submitted");
        Ok(job_id)
    }

    /// Live status from the queue, falling back to the persisted experiment
    /// status when the queue no longer tracks the job.
    pub fn status(&self, job_id: &str) -> Result<StatusView, PipelineError> {
        let experiment = self
            .store
            .get_experiment(job_id)?
            .ok_or_else(|| PipelineError::NotFound("Job not found".to_string()))?;

        let report = self.queue.get_status(job_id);
        let report = if report.status == JobStatus::NotFound {
            persisted_report(&experiment)
        } else {
            report
        };

        Ok(StatusView {
            job_id: job_id.to_string(),
            status: report.status,
            progress: report.progress,
            message: report.message,
            created_at: experiment.created_at,
        })
    }

    pub fn result(&self, job_id: &str) -> Result<ResultView, PipelineError> {
        let result = self
            .store
            .get_result(job_id)?
            .ok_or_else(|| PipelineError::NotFound("Result not found".to_string()))?;
        let created_at = self.store.get_experiment(job_id)?.map(|e| e.created_at);

        Ok(ResultView {
            job_id: result.job_id,
            status: result.status,
            results: result.results,
            error: result.error,
            error_category: result.error_category,
            created_at,
            completed_at: result.completed_at,
        })
    }

    /// Explanation of a completed run.
    pub fn explain(&self, job_id: &str) -> Result<Explanation, PipelineError> {
        let result = self
            .store
            .get_result(job_id)?
            .ok_or_else(|| PipelineError::NotFound("Result not found".to_string()))?;
        let experiment = self
            .store
            .get_experiment(job_id)?
            .ok_or_else(|| PipelineError::NotFound("Job not found".to_string()))?;

        match result.results {
            Some(results) if result.status == JobStatus::Completed => {
                Ok(explain_run(&experiment.params, &results))
            }
            _ => Err(PipelineError::Conflict(format!(
                "Experiment {job_id} did not complete; nothing to explain"
            ))),
        }
    }
}

fn persisted_report(experiment: &ExperimentRecord) -> JobStatusReport {
    let progress = if experiment.status == JobStatus::Completed {
        1.0
    } else {
        0.0
    };
    JobStatusReport {
        status: experiment.status,
        progress,
        message: format!("Job {} (restored from storage)", experiment.status),
        created_at: Some(experiment.created_at),
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("queue", &self.queue)
            .field("store", &self.store.backend_name())
            .field("models", &self.models)
            .field("optimizer", &self.optimizer)
            .finish()
    }
}
