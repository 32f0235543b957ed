//! Service-wide default constants.
//!
//! Grouped by subsystem. `AppConfig`'s `Default` impls read from here.

// ============================================================================
// Server
// ============================================================================

/// HTTP listen address.
pub const SERVER_ADDR: &str = "0.0.0.0:8000";

/// Directory holding the sled database and persisted models.
pub const DATA_DIR: &str = "./data";

/// Browser origins allowed by CORS when none are configured.
pub const CORS_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:5173"];

// ============================================================================
// Workers
// ============================================================================

/// Concurrent experiment workers.
pub const WORKER_COUNT: usize = crate::jobs::DEFAULT_WORKERS;

/// Upper bound accepted by validation. Each worker holds a blocking thread.
pub const MAX_WORKER_COUNT: usize = 64;

// ============================================================================
// Model
// ============================================================================

/// Seed for synthetic data generation, the train/test split and the forest.
pub const MODEL_SEED: u64 = 42;

/// Synthetic engine runs generated per training.
pub const MODEL_SAMPLES: usize = 500;

/// Fraction of samples held out for metrics.
pub const MODEL_TEST_FRACTION: f64 = 0.2;

/// Smallest dataset that still leaves rows for every CV fold.
pub const MIN_MODEL_SAMPLES: usize = 20;

// ============================================================================
// Jobs
// ============================================================================

/// Interval between sweeps of finished jobs (seconds). 3 600 = 1 hour.
pub const CLEANUP_INTERVAL_SECS: u64 = 3_600;

/// Finished jobs older than this are evicted from the queue (hours).
pub const JOB_MAX_AGE_HOURS: i64 = 24;

/// Largest accepted job age (hours). 876 000 = 100 years.
pub const MAX_JOB_AGE_HOURS: i64 = 24 * 365 * 100;
