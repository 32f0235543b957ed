//! Shared data structures for the rocket engine optimizer
//!
//! - `experiment`: ExperimentParams / EngineParams and intake validation
//! - `job`: JobStatus, JobFault (categorised task faults), JobStatusReport
//! - `results`: SimulationResult, OptimizationOutcome, ModelMetrics, ExperimentResults

mod experiment;
mod job;
mod results;

pub use experiment::*;
pub use job::*;
pub use results::*;
