//! Engine performance model
//!
//! Pure functions over a trained thrust predictor:
//! - `simulate()` - Thrust, efficiency and temperature ratio for one configuration
//! - `explain_run()` - Rule-based explanation of a finished experiment

pub mod explain;
pub mod simulation;

pub use explain::{explain_run, Direction, Explanation, Suggestion};
pub use simulation::{simulate, EngineError, REFERENCE_TEMP};
