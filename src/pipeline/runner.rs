//! Experiment execution
//!
//! `execute_experiment` is the synchronous train → simulate → optimize
//! pipeline. `run_experiment_task` wraps it as a queue job: it reports
//! progress checkpoints, captures every fault (panics included) at one
//! boundary, and persists exactly one result record.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{error, info, warn};

use crate::engine::{simulate, EngineError};
use crate::jobs::JobReporter;
use crate::ml_engine::{ModelCache, ModelProfile, TrainError};
use crate::optimization::{optimize_fuel_mixture, OptimizeError, OptimizerSettings};
use crate::storage::{ExperimentStore, ResultRecord, StoreError};
use crate::types::{
    ExperimentParams, ExperimentResults, FaultCategory, JobFault, JobStatus, ValidationError,
};

/// Progress checkpoints reported while an experiment runs.
pub mod checkpoints {
    pub const STARTED: (f64, &str) = (0.1, "Starting experiment");
    pub const MODEL_LOADED: (f64, &str) = (0.3, "Model loaded");
    pub const SIMULATED: (f64, &str) = (0.6, "Simulation completed");
    pub const OPTIMIZED: (f64, &str) = (0.9, "Optimization completed");
}

impl From<ValidationError> for JobFault {
    fn from(e: ValidationError) -> Self {
        Self::new(FaultCategory::Validation, e.to_string())
    }
}

impl From<TrainError> for JobFault {
    fn from(e: TrainError) -> Self {
        Self::new(FaultCategory::Inference, format!("model unavailable: {e}"))
    }
}

impl From<EngineError> for JobFault {
    fn from(e: EngineError) -> Self {
        Self::new(FaultCategory::Inference, e.to_string())
    }
}

impl From<OptimizeError> for JobFault {
    fn from(e: OptimizeError) -> Self {
        match e {
            OptimizeError::Solver(_) => Self::new(FaultCategory::SolverNonConvergence, e.to_string()),
            OptimizeError::Simulation(inner) => inner.into(),
        }
    }
}

impl From<StoreError> for JobFault {
    fn from(e: StoreError) -> Self {
        Self::new(FaultCategory::Storage, e.to_string())
    }
}

/// Run one experiment to completion, calling `progress` at each checkpoint.
///
/// A `None` alpha skips the optimization step.
pub fn execute_experiment(
    params: &ExperimentParams,
    models: &ModelCache,
    optimizer: &OptimizerSettings,
    progress: &dyn Fn(f64, &str),
) -> Result<ExperimentResults, JobFault> {
    let report = |(p, msg): (f64, &str)| progress(p, msg);

    report(checkpoints::STARTED);
    params.validate()?;

    let model = models.get_or_train(ModelProfile::from_tune_flag(params.tune_model()))?;
    report(checkpoints::MODEL_LOADED);

    let simulation = simulate(&params.engine(), &*model)?;
    report(checkpoints::SIMULATED);

    let optimization = match params.alpha {
        Some(alpha) => {
            let settings = optimizer.with_impulse_override(params.optimize_isp);
            Some(optimize_fuel_mixture(
                &*model,
                alpha,
                params.max_temp_or_default(),
                &settings,
            )?)
        }
        None => None,
    };
    report(checkpoints::OPTIMIZED);

    Ok(ExperimentResults {
        simulation,
        optimization,
        model_metrics: model.metrics.clone(),
    })
}

/// Queue job body for one submitted experiment.
///
/// Whatever happens inside, a result record is written and the experiment
/// status mirrored before returning. The returned fault (if any) is what the
/// queue reports to pollers.
pub fn run_experiment_task(
    job_id: &str,
    params: &ExperimentParams,
    models: &ModelCache,
    optimizer: &OptimizerSettings,
    store: &dyn ExperimentStore,
    reporter: &JobReporter,
) -> Result<(), JobFault> {
    if let Err(e) = store.set_experiment_status(job_id, JobStatus::Running) {
        warn!(job_id, error = %e, "Could not mark experiment running");
    }

    let progress = |p: f64, msg: &str| {
        reporter.progress(p, msg);
    };
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        execute_experiment(params, models, optimizer, &progress)
    }))
    .unwrap_or_else(|payload| Err(JobFault::from_panic(payload.as_ref())));

    match outcome {
        Ok(results) => match store.save_result(&ResultRecord::success(job_id, results)) {
            Ok(()) => {
                mirror_status(store, job_id, JobStatus::Completed);
                info!(job_id, "Experiment completed");
                Ok(())
            }
            Err(e) => {
                error!(job_id, error = %e, "Failed to persist experiment result");
                let fault = JobFault::from(e);
                record_failure(store, job_id, &fault);
                Err(fault)
            }
        },
        Err(fault) => {
            warn!(job_id, category = %fault.category, error = %fault, "Experiment failed");
            record_failure(store, job_id, &fault);
            Err(fault)
        }
    }
}

/// Best-effort failure record plus status mirror.
fn record_failure(store: &dyn ExperimentStore, job_id: &str, fault: &JobFault) {
    if let Err(e) = store.save_result(&ResultRecord::failure(job_id, fault)) {
        error!(job_id, error = %e, "Failed to persist failure record");
    }
    mirror_status(store, job_id, JobStatus::Failed);
}

fn mirror_status(store: &dyn ExperimentStore, job_id: &str, status: JobStatus) {
    if let Err(e) = store.set_experiment_status(job_id, status) {
        error!(job_id, status = %status, error = %e, "Failed to update experiment status");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobQueue;
    use crate::ml_engine::CacheSettings;
    use crate::storage::{ExperimentRecord, InMemoryStore};
    use crate::types::JobStatusReport;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn small_cache() -> ModelCache {
        ModelCache::new(CacheSettings {
            samples: 120,
            ..CacheSettings::default()
        })
    }

    /// Store whose successful result writes always fail.
    #[derive(Default)]
    struct RejectingStore {
        inner: InMemoryStore,
    }

    impl ExperimentStore for RejectingStore {
        fn create_experiment(&self, record: &ExperimentRecord) -> Result<(), StoreError> {
            self.inner.create_experiment(record)
        }

        fn get_experiment(&self, id: &str) -> Result<Option<ExperimentRecord>, StoreError> {
            self.inner.get_experiment(id)
        }

        fn set_experiment_status(&self, id: &str, status: JobStatus) -> Result<bool, StoreError> {
            self.inner.set_experiment_status(id, status)
        }

        fn save_result(&self, record: &ResultRecord) -> Result<(), StoreError> {
            if record.status == JobStatus::Completed {
                return Err(StoreError::Poisoned);
            }
            self.inner.save_result(record)
        }

        fn get_result(&self, job_id: &str) -> Result<Option<ResultRecord>, StoreError> {
            self.inner.get_result(job_id)
        }

        fn experiment_count(&self) -> Result<usize, StoreError> {
            self.inner.experiment_count()
        }

        fn backend_name(&self) -> &'static str {
            "Rejecting"
        }
    }

    /// Enqueue the real task body for `params`, bypassing intake validation.
    async fn run_queued(
        store: Arc<dyn ExperimentStore>,
        job_id: &str,
        params: ExperimentParams,
    ) -> JobStatusReport {
        store
            .create_experiment(&ExperimentRecord::queued(job_id, params.clone()))
            .unwrap();

        let queue = JobQueue::new(1);
        let models = Arc::new(small_cache());
        let task_store = Arc::clone(&store);
        let task_id = job_id.to_string();
        queue
            .enqueue(job_id, move |reporter| {
                run_experiment_task(
                    &task_id,
                    &params,
                    &models,
                    &OptimizerSettings::default(),
                    task_store.as_ref(),
                    &reporter,
                )
            })
            .unwrap();

        for _ in 0..1500 {
            let report = queue.get_status(job_id);
            if report.status.is_terminal() {
                return report;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {job_id} did not finish");
    }

    #[test]
    fn test_checkpoints_in_order() {
        let seen = Mutex::new(Vec::new());
        let record = |p: f64, _: &str| seen.lock().unwrap().push(p);

        let results = execute_experiment(
            &ExperimentParams::new(3.5, 5.0, 3000.0, 300.0),
            &small_cache(),
            &OptimizerSettings::default(),
            &record,
        )
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0.1, 0.3, 0.6, 0.9]);
        assert!(results.simulation.thrust > 0.0);
        let optimization = results.optimization.unwrap();
        let config = optimization.configuration().unwrap();
        assert!(config.optimal_params.temp <= 4000.0);
    }

    #[test]
    fn test_null_alpha_skips_optimization() {
        let mut params = ExperimentParams::new(3.5, 5.0, 3000.0, 300.0);
        params.alpha = None;
        let results =
            execute_experiment(&params, &small_cache(), &OptimizerSettings::default(), &|_, _| {})
                .unwrap();
        assert!(results.optimization.is_none());
    }

    #[test]
    fn test_invalid_params_are_validation_fault() {
        let params = ExperimentParams::new(9.0, 5.0, 3000.0, 300.0);
        let fault =
            execute_experiment(&params, &small_cache(), &OptimizerSettings::default(), &|_, _| {})
                .unwrap_err();
        assert_eq!(fault.category, FaultCategory::Validation);
    }

    #[test]
    fn test_unreachable_max_temp_is_reported_not_raised() {
        let mut params = ExperimentParams::new(3.5, 5.0, 3000.0, 300.0);
        params.max_temp = Some(1000.0);
        let results =
            execute_experiment(&params, &small_cache(), &OptimizerSettings::default(), &|_, _| {})
                .unwrap();
        assert!(!results.optimization.unwrap().is_success());
    }

    #[test]
    fn test_fault_categories() {
        let solver: JobFault = OptimizeError::Solver(crate::optimization::MinimizeError::InfeasibleStart).into();
        assert_eq!(solver.category, FaultCategory::SolverNonConvergence);

        let inference: JobFault = EngineError::NonFinitePrediction(f64::NAN).into();
        assert_eq!(inference.category, FaultCategory::Inference);

        let storage: JobFault = StoreError::Poisoned.into();
        assert_eq!(storage.category, FaultCategory::Storage);
    }

    #[tokio::test]
    async fn test_failed_task_persists_failure_record() {
        let store: Arc<dyn ExperimentStore> = Arc::new(InMemoryStore::new());
        let report = run_queued(
            Arc::clone(&store),
            "bad-mixture",
            ExperimentParams::new(9.0, 5.0, 3000.0, 300.0),
        )
        .await;

        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.progress, 0.0);
        assert!(report.message.starts_with("Job failed: "), "{}", report.message);

        let result = store.get_result("bad-mixture").unwrap().unwrap();
        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.error_category, Some(FaultCategory::Validation));
        assert!(result.results.is_none());
        assert!(result.error.unwrap().contains("O_F_ratio"));

        let experiment = store.get_experiment("bad-mixture").unwrap().unwrap();
        assert_eq!(experiment.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_unsaved_success_still_leaves_failure_record() {
        let store: Arc<dyn ExperimentStore> = Arc::new(RejectingStore::default());
        let mut params = ExperimentParams::new(3.5, 5.0, 3000.0, 300.0);
        params.alpha = None;
        let report = run_queued(Arc::clone(&store), "unsaved", params).await;

        assert_eq!(report.status, JobStatus::Failed);

        let result = store.get_result("unsaved").unwrap().unwrap();
        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.error_category, Some(FaultCategory::Storage));

        let experiment = store.get_experiment("unsaved").unwrap().unwrap();
        assert_eq!(experiment.status, JobStatus::Failed);
    }
}
