//! Job Queue: in-memory job registry backed by a bounded worker pool
//!
//! Each job runs as a blocking closure on tokio's blocking pool, gated by a
//! semaphore with one permit per worker slot. Jobs beyond the pool size wait
//! for a permit; there is no admission control, cancellation or retry.
//!
//! The table of job records sits behind one mutex. A record holds the
//! receiving end of a oneshot channel that the worker resolves when the job
//! returns (or panics). `get_status` inspects that handle lazily and moves the
//! record to its terminal state the first time it sees the result.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, error, info, warn};

use crate::types::{JobFault, JobStatus, JobStatusReport};

/// Default number of concurrent worker slots.
pub const DEFAULT_WORKERS: usize = 2;

type Outcome = Result<(), JobFault>;

/// Errors from queue operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobQueueError {
    #[error("job {0} is already registered")]
    Duplicate(String),
}

struct JobRecord {
    status: JobStatus,
    progress: f64,
    message: String,
    created_at: DateTime<Utc>,
    /// `None` once the outcome has been consumed.
    handle: Option<oneshot::Receiver<Outcome>>,
}

impl JobRecord {
    fn report(&self) -> JobStatusReport {
        JobStatusReport {
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            created_at: Some(self.created_at),
        }
    }

    /// Fold a finished computation into the record. No-op while running or
    /// once terminal.
    fn resolve(&mut self, id: &str) {
        if self.status.is_terminal() {
            return;
        }
        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        let outcome = match handle.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(JobFault::unknown("worker exited without reporting a result"))
            }
        };
        self.handle = None;

        match outcome {
            Ok(()) => {
                self.status = JobStatus::Completed;
                self.progress = 1.0;
                self.message = "Job completed".to_string();
                debug!(job_id = id, "Job resolved as completed");
            }
            Err(fault) => {
                self.status = JobStatus::Failed;
                self.progress = 0.0;
                self.message = format!("Job failed: {fault}");
                debug!(job_id = id, category = %fault.category, "Job resolved as failed");
            }
        }
    }
}

type JobTable = Mutex<HashMap<String, JobRecord>>;

fn lock(table: &JobTable) -> MutexGuard<'_, HashMap<String, JobRecord>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write a mid-run status into the table.
///
/// Returns `false` when the job is unknown or already terminal.
fn write_status(
    table: &JobTable,
    id: &str,
    status: JobStatus,
    progress: f64,
    message: impl Into<String>,
) -> bool {
    let mut jobs = lock(table);
    match jobs.get_mut(id) {
        Some(record) if !record.status.is_terminal() => {
            record.status = status;
            record.progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
            record.message = message.into();
            true
        }
        Some(_) => {
            debug!(job_id = id, "Ignoring status write to terminal job");
            false
        }
        None => false,
    }
}

/// Handle given to a running job for pushing progress back to the queue.
#[derive(Clone)]
pub struct JobReporter {
    id: String,
    table: Arc<JobTable>,
}

impl JobReporter {
    pub fn job_id(&self) -> &str {
        &self.id
    }

    /// Record a progress checkpoint. The job stays `running`.
    pub fn progress(&self, progress: f64, message: impl Into<String>) -> bool {
        write_status(&self.table, &self.id, JobStatus::Running, progress, message)
    }
}

impl std::fmt::Debug for JobReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobReporter").field("id", &self.id).finish_non_exhaustive()
    }
}

/// In-memory job registry with a fixed-size worker pool.
pub struct JobQueue {
    table: Arc<JobTable>,
    workers: Arc<Semaphore>,
    worker_count: usize,
}

impl JobQueue {
    /// Create a queue with `workers` concurrent slots (at least one).
    pub fn new(workers: usize) -> Self {
        let worker_count = workers.max(1);
        info!(workers = worker_count, "Job queue created");
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            workers: Arc::new(Semaphore::new(worker_count)),
            worker_count,
        }
    }

    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Register `id` and schedule `task` on the worker pool.
    ///
    /// Must be called from within a tokio runtime. The record starts
    /// `queued` and moves to `running` once the task has been handed to the
    /// pool. A panic inside `task` is captured and surfaces as a failed job.
    pub fn enqueue<F>(&self, id: impl Into<String>, task: F) -> Result<(), JobQueueError>
    where
        F: FnOnce(JobReporter) -> Result<(), JobFault> + Send + 'static,
    {
        let id = id.into();
        let (tx, rx) = oneshot::channel();

        {
            let mut jobs = lock(&self.table);
            if jobs.contains_key(&id) {
                return Err(JobQueueError::Duplicate(id));
            }
            jobs.insert(
                id.clone(),
                JobRecord {
                    status: JobStatus::Queued,
                    progress: 0.0,
                    message: "Job queued".to_string(),
                    created_at: Utc::now(),
                    handle: Some(rx),
                },
            );
        }

        let reporter = JobReporter {
            id: id.clone(),
            table: Arc::clone(&self.table),
        };
        let workers = Arc::clone(&self.workers);
        let job_id = id.clone();

        tokio::spawn(async move {
            // The semaphore is never closed.
            let Ok(_permit) = workers.acquire_owned().await else {
                error!(job_id = %job_id, "Worker pool closed before job could start");
                return;
            };

            let joined = tokio::task::spawn_blocking(move || {
                catch_unwind(AssertUnwindSafe(|| task(reporter)))
                    .unwrap_or_else(|payload| Err(JobFault::from_panic(payload.as_ref())))
            })
            .await;

            let outcome = joined.unwrap_or_else(|e| {
                Err(JobFault::unknown(format!("worker task aborted: {e}")))
            });
            if let Err(fault) = &outcome {
                warn!(job_id = %job_id, category = %fault.category, error = %fault, "Job failed");
            } else {
                debug!(job_id = %job_id, "Job finished");
            }
            // Receiver may already be gone if the record was removed.
            let _ = tx.send(outcome);
        });

        // Only promote; the task may already have reported its own progress.
        {
            let mut jobs = lock(&self.table);
            if let Some(record) = jobs.get_mut(&id) {
                if record.status == JobStatus::Queued {
                    record.status = JobStatus::Running;
                    record.message = "Job started".to_string();
                }
            }
        }

        info!(job_id = %id, "Job enqueued");
        Ok(())
    }

    /// Current status of `id`, resolving a finished computation first.
    pub fn get_status(&self, id: &str) -> JobStatusReport {
        let mut jobs = lock(&self.table);
        match jobs.get_mut(id) {
            Some(record) => {
                record.resolve(id);
                record.report()
            }
            None => JobStatusReport::not_found(),
        }
    }

    /// Overwrite a non-terminal record. Returns whether the write applied.
    pub fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        progress: f64,
        message: impl Into<String>,
    ) -> bool {
        write_status(&self.table, id, status, progress, message)
    }

    /// Remove terminal records created more than `max_age` ago.
    ///
    /// Finished-but-unpolled jobs are resolved first so they are eligible.
    /// A window reaching past the earliest representable time removes nothing.
    pub fn cleanup(&self, max_age: chrono::Duration) -> usize {
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            debug!(?max_age, "Cleanup window predates every job, skipping");
            return 0;
        };
        let mut jobs = lock(&self.table);
        let before = jobs.len();
        jobs.retain(|id, record| {
            record.resolve(id);
            !(record.status.is_terminal() && record.created_at < cutoff)
        });
        let removed = before - jobs.len();
        if removed > 0 {
            info!(removed, remaining = jobs.len(), "Cleaned up finished jobs");
        }
        removed
    }

    pub fn len(&self) -> usize {
        lock(&self.table).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.table).is_empty()
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("worker_count", &self.worker_count)
            .finish_non_exhaustive()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}
