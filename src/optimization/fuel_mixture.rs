//! Fuel-mixture optimization around the thrust surrogate.
//!
//! Minimizes `α·(−thrust) + (1−α)·temperature` over mixture ratio, chamber
//! pressure and combustion temperature (plus specific impulse in
//! [`ImpulseMode::Free`]), subject to `temperature ≤ max_temp`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::minimizer::{minimize, Bound, MinimizeError, SearchOptions};
use crate::engine::{simulate, EngineError};
use crate::ml_engine::ThrustPredictor;
use crate::types::{bounds, EngineParams, OptimalConfiguration, OptimizationOutcome};

/// Starting point `(O/F ratio, pressure, temperature)`.
pub const INITIAL_GUESS: [f64; 3] = [3.5, 5.0, 3000.0];

/// Specific impulse held constant in [`ImpulseMode::Fixed`].
pub const DEFAULT_FIXED_IMPULSE: f64 = 300.0;

/// How specific impulse is treated by the search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpulseMode {
    /// Held at `fixed_impulse`.
    #[default]
    Fixed,
    /// Searched within the impulse bounds, starting from `fixed_impulse`.
    Free,
}

/// Optimizer configuration (`[optimizer]` section).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    pub impulse_mode: ImpulseMode,
    pub fixed_impulse: f64,
    pub max_evaluations: usize,
    pub tolerance: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        let search = SearchOptions::default();
        Self {
            impulse_mode: ImpulseMode::Fixed,
            fixed_impulse: DEFAULT_FIXED_IMPULSE,
            max_evaluations: search.max_evaluations,
            tolerance: search.tolerance,
        }
    }
}

impl OptimizerSettings {
    /// Copy with the impulse mode overridden by a per-request flag.
    pub fn with_impulse_override(mut self, optimize_isp: Option<bool>) -> Self {
        match optimize_isp {
            Some(true) => self.impulse_mode = ImpulseMode::Free,
            Some(false) => self.impulse_mode = ImpulseMode::Fixed,
            None => {}
        }
        self
    }

    fn search_options(&self) -> SearchOptions {
        SearchOptions {
            max_evaluations: self.max_evaluations,
            tolerance: self.tolerance,
            ..SearchOptions::default()
        }
    }
}

/// Faults that prevent the optimizer from producing any outcome.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizeError {
    #[error("solver setup rejected: {0}")]
    Solver(MinimizeError),
    #[error("re-simulating the optimum failed: {0}")]
    Simulation(#[from] EngineError),
}

/// Search for the configuration minimizing the weighted thrust/temperature
/// objective.
///
/// Non-convergence is reported as [`OptimizationOutcome::NotConverged`].
pub fn optimize_fuel_mixture(
    model: &dyn ThrustPredictor,
    alpha: f64,
    max_temp: f64,
    settings: &OptimizerSettings,
) -> Result<OptimizationOutcome, OptimizeError> {
    if !(0.0..=1.0).contains(&alpha) {
        return Ok(not_converged(format!("alpha must be within [0, 1], got {alpha}")));
    }
    if !(settings.fixed_impulse >= bounds::ISP.0 && settings.fixed_impulse <= bounds::ISP.1) {
        return Err(OptimizeError::Solver(MinimizeError::InvalidBound {
            dim: 3,
            lower: settings.fixed_impulse,
            upper: settings.fixed_impulse,
        }));
    }
    // The temperature constraint cannot be met anywhere inside the bounds.
    if !(max_temp >= bounds::TEMP.0) {
        return Ok(not_converged("Inequality constraints incompatible".to_string()));
    }

    let free_isp = settings.impulse_mode == ImpulseMode::Free;
    let fixed_isp = settings.fixed_impulse;

    let mut search_bounds = vec![
        Bound::new(bounds::O_F_RATIO.0, bounds::O_F_RATIO.1),
        Bound::new(bounds::PRESSURE.0, bounds::PRESSURE.1),
        Bound::new(bounds::TEMP.0, bounds::TEMP.1),
    ];
    let mut start = INITIAL_GUESS.to_vec();
    start[2] = start[2].min(max_temp);
    if free_isp {
        search_bounds.push(Bound::new(bounds::ISP.0, bounds::ISP.1));
        start.push(fixed_isp);
    }

    let to_params = |x: &[f64]| {
        let isp = if free_isp { x[3] } else { fixed_isp };
        EngineParams::new(x[0], x[1], x[2], isp)
    };
    let objective = |x: &[f64]| {
        let thrust = model.predict_thrust(&to_params(x).features());
        alpha * (-thrust) + (1.0 - alpha) * x[2]
    };
    let feasible = |x: &[f64]| x[2] <= max_temp;

    debug!(alpha, max_temp, free_isp, "Starting fuel mixture search");

    let minimum = match minimize(
        objective,
        feasible,
        &start,
        &search_bounds,
        &settings.search_options(),
    ) {
        Ok(minimum) => minimum,
        Err(e @ (MinimizeError::BudgetExhausted { .. } | MinimizeError::InfeasibleStart)) => {
            info!(error = %e, "Fuel mixture search did not converge");
            return Ok(not_converged(e.to_string()));
        }
        Err(e) => return Err(OptimizeError::Solver(e)),
    };

    let optimal_params = to_params(&minimum.x);
    let simulation = simulate(&optimal_params, model)?;

    info!(
        o_f_ratio = optimal_params.o_f_ratio,
        pressure = optimal_params.pressure,
        temp = optimal_params.temp,
        isp = optimal_params.isp,
        thrust = simulation.thrust,
        evaluations = minimum.evaluations,
        "Fuel mixture optimized"
    );

    Ok(OptimizationOutcome::Converged(OptimalConfiguration {
        optimal_params,
        predicted_thrust: simulation.thrust,
        optimization_value: minimum.value,
        evaluations: minimum.evaluations,
    }))
}

fn not_converged(error: String) -> OptimizationOutcome {
    OptimizationOutcome::NotConverged { error }
}
