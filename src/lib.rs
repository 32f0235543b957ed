//! Rocket Optimizer: Engine Simulation and Fuel-Mixture Optimization
//!
//! Job-queue service that predicts rocket engine performance with a
//! regression model trained on synthetic data, then searches for the
//! mixture that best trades thrust against combustion temperature.
//!
//! ## Architecture
//!
//! - **ML Engine**: Synthetic data, random forest, training and model cache
//! - **Engine**: Thrust/efficiency simulation and result explanations
//! - **Optimization**: Bounded, constrained fuel-mixture search
//! - **Jobs**: Worker-limited background queue with status tracking
//! - **Storage**: Experiment and result persistence (sled)
//! - **Pipeline**: Submission, execution and lookup of experiments
//! - **API**: HTTP surface (axum)

pub mod api;
pub mod config;
pub mod engine;
pub mod jobs;
pub mod ml_engine;
pub mod optimization;
pub mod pipeline;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::AppConfig;

// Re-export commonly used types
pub use types::{
    ExperimentParams, ExperimentResults, FaultCategory, JobFault, JobStatus, OptimizationOutcome,
    SimulationResult,
};

// Re-export service entry points
pub use api::create_app;
pub use pipeline::AppState;
