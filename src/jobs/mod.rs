//! Background job execution
//!
//! - `queue`: Job registry, bounded worker pool, lazy status resolution
//! - `cleanup`: Periodic eviction of old finished jobs

pub mod cleanup;
pub mod queue;

pub use cleanup::run_cleanup_loop;
pub use queue::{JobQueue, JobQueueError, JobReporter, DEFAULT_WORKERS};
