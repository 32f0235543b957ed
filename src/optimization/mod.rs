//! Fuel Mixture Optimization
//!
//! Bounded, constrained search over engine configurations using the trained
//! thrust model as the objective surrogate. Entirely derivative-free: the
//! forest's piecewise-constant predictions have no useful gradient.

pub mod fuel_mixture;
pub mod minimizer;

pub use fuel_mixture::{optimize_fuel_mixture, ImpulseMode, OptimizeError, OptimizerSettings};
pub use minimizer::{minimize, Bound, MinimizeError, Minimum, SearchOptions};
