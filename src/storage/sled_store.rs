//! Sled-backed experiment store.
//!
//! Trees:
//! - `experiments`: job id → JSON `ExperimentRecord`
//! - `results`: job id → JSON `ResultRecord` (insert-once via compare-and-swap)

use std::path::Path;

use sled::{Db, Tree};
use tracing::{debug, info};

use super::persistence::{ExperimentRecord, ExperimentStore, ResultRecord, StoreError};
use crate::types::JobStatus;

const EXPERIMENTS_TREE: &str = "experiments";
const RESULTS_TREE: &str = "results";

pub struct SledStore {
    db: Db,
    experiments: Tree,
    results: Tree,
}

impl SledStore {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        let store = Self::from_db(db)?;
        info!(
            path = %path.as_ref().display(),
            experiments = store.experiments.len(),
            results = store.results.len(),
            "Experiment store opened"
        );
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_temp() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let experiments = db.open_tree(EXPERIMENTS_TREE)?;
        let results = db.open_tree(RESULTS_TREE)?;
        Ok(Self {
            db,
            experiments,
            results,
        })
    }

    /// Insert `value` under `key` only if the key is absent.
    fn insert_new(tree: &Tree, key: &str, value: Vec<u8>) -> Result<bool, StoreError> {
        let swapped = tree.compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(value))?;
        Ok(swapped.is_ok())
    }
}

impl ExperimentStore for SledStore {
    fn create_experiment(&self, record: &ExperimentRecord) -> Result<(), StoreError> {
        let value = serde_json::to_vec(record)?;
        if !Self::insert_new(&self.experiments, &record.id, value)? {
            return Err(StoreError::DuplicateExperiment(record.id.clone()));
        }
        debug!(job_id = %record.id, "Stored experiment");
        Ok(())
    }

    fn get_experiment(&self, id: &str) -> Result<Option<ExperimentRecord>, StoreError> {
        self.experiments
            .get(id.as_bytes())?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(StoreError::from))
            .transpose()
    }

    fn set_experiment_status(&self, id: &str, status: JobStatus) -> Result<bool, StoreError> {
        let Some(mut record) = self.get_experiment(id)? else {
            return Ok(false);
        };
        record.status = status;
        self.experiments
            .insert(id.as_bytes(), serde_json::to_vec(&record)?)?;
        debug!(job_id = id, status = %status, "Updated experiment status");
        Ok(true)
    }

    fn save_result(&self, record: &ResultRecord) -> Result<(), StoreError> {
        let value = serde_json::to_vec(record)?;
        if !Self::insert_new(&self.results, &record.job_id, value)? {
            return Err(StoreError::ResultExists(record.job_id.clone()));
        }
        debug!(job_id = %record.job_id, status = %record.status, "Stored result");
        Ok(())
    }

    fn get_result(&self, job_id: &str) -> Result<Option<ResultRecord>, StoreError> {
        self.results
            .get(job_id.as_bytes())?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(StoreError::from))
            .transpose()
    }

    fn experiment_count(&self) -> Result<usize, StoreError> {
        Ok(self.experiments.len())
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "Sled"
    }
}
