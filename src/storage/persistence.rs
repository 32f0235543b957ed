//! ExperimentStore trait: pluggable storage for experiments and results
//!
//! Two record kinds, both keyed by job id:
//! - `ExperimentRecord`: submitted parameters and latest known status
//! - `ResultRecord`: terminal outcome, written exactly once
//!
//! Backends:
//! - `InMemoryStore`: for tests and the offline `run` command
//! - `SledStore`: durable embedded database (see `sled_store`)

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ExperimentParams, ExperimentResults, FaultCategory, JobFault, JobStatus};

/// A submitted experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub id: String,
    pub params: ExperimentParams,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl ExperimentRecord {
    pub fn queued(id: impl Into<String>, params: ExperimentParams) -> Self {
        Self {
            id: id.into(),
            params,
            status: JobStatus::Queued,
            created_at: Utc::now(),
        }
    }
}

/// Terminal outcome of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub results: Option<ExperimentResults>,
    pub error: Option<String>,
    pub error_category: Option<FaultCategory>,
    pub completed_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn success(job_id: impl Into<String>, results: ExperimentResults) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Completed,
            results: Some(results),
            error: None,
            error_category: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failure(job_id: impl Into<String>, fault: &JobFault) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Failed,
            results: None,
            error: Some(fault.message.clone()),
            error_category: Some(fault.category),
            completed_at: Utc::now(),
        }
    }
}

/// Storage backend for experiments and their results.
///
/// Implementations must be thread-safe (Send + Sync): the API handlers and
/// the worker pool share one store.
pub trait ExperimentStore: Send + Sync {
    /// Insert a new experiment. Fails if the id is already present.
    fn create_experiment(&self, record: &ExperimentRecord) -> Result<(), StoreError>;

    fn get_experiment(&self, id: &str) -> Result<Option<ExperimentRecord>, StoreError>;

    /// Update the stored status. Returns `false` if the experiment is unknown.
    fn set_experiment_status(&self, id: &str, status: JobStatus) -> Result<bool, StoreError>;

    /// Persist a terminal result. Fails if one already exists for the job.
    fn save_result(&self, record: &ResultRecord) -> Result<(), StoreError>;

    fn get_result(&self, job_id: &str) -> Result<Option<ResultRecord>, StoreError>;

    fn experiment_count(&self) -> Result<usize, StoreError>;

    /// Force buffered writes to stable storage.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
    #[error("experiment {0} already exists")]
    DuplicateExperiment(String),
    #[error("result for job {0} already recorded")]
    ResultExists(String),
}

/// In-memory store for testing and minimal deployments
///
/// Thread-safe via `RwLock`. Not durable: data lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    experiments: RwLock<HashMap<String, ExperimentRecord>>,
    results: RwLock<HashMap<String, ResultRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExperimentStore for InMemoryStore {
    fn create_experiment(&self, record: &ExperimentRecord) -> Result<(), StoreError> {
        let mut store = self.experiments.write().map_err(|_| StoreError::Poisoned)?;
        if store.contains_key(&record.id) {
            return Err(StoreError::DuplicateExperiment(record.id.clone()));
        }
        store.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get_experiment(&self, id: &str) -> Result<Option<ExperimentRecord>, StoreError> {
        let store = self.experiments.read().map_err(|_| StoreError::Poisoned)?;
        Ok(store.get(id).cloned())
    }

    fn set_experiment_status(&self, id: &str, status: JobStatus) -> Result<bool, StoreError> {
        let mut store = self.experiments.write().map_err(|_| StoreError::Poisoned)?;
        Ok(store.get_mut(id).map(|r| r.status = status).is_some())
    }

    fn save_result(&self, record: &ResultRecord) -> Result<(), StoreError> {
        let mut store = self.results.write().map_err(|_| StoreError::Poisoned)?;
        if store.contains_key(&record.job_id) {
            return Err(StoreError::ResultExists(record.job_id.clone()));
        }
        store.insert(record.job_id.clone(), record.clone());
        Ok(())
    }

    fn get_result(&self, job_id: &str) -> Result<Option<ResultRecord>, StoreError> {
        let store = self.results.read().map_err(|_| StoreError::Poisoned)?;
        Ok(store.get(job_id).cloned())
    }

    fn experiment_count(&self) -> Result<usize, StoreError> {
        Ok(self.experiments.read().map_err(|_| StoreError::Poisoned)?.len())
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
