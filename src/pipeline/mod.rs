//! Experiment Pipeline
//!
//! ```text
//! POST /run ──▶ validate ──▶ persist experiment (queued) ──▶ enqueue
//!                                                             │
//!   worker slot: 0.1 start ▶ 0.3 model ▶ 0.6 simulate ▶ 0.9 optimize
//!                                                             │
//!                             persist result ◀── completed / failed
//! ```
//!
//! `AppState` owns the queue, store and model cache and exposes the
//! lifecycle operations; `runner` holds the job body.

pub mod runner;
mod state;

pub use runner::{execute_experiment, run_experiment_task};
pub use state::*;
