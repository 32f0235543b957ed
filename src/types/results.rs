//! Result payload types produced by the engine and persisted per experiment.

use serde::{Deserialize, Serialize};

use super::experiment::EngineParams;

/// Output of a single simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Predicted thrust (kN).
    pub thrust: f64,
    /// Thrust normalised by `pressure × isp`.
    pub efficiency: f64,
    /// Combustion temperature relative to the 3000 K reference.
    pub temperature_ratio: f64,
    pub params: EngineParams,
}

/// A converged optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalConfiguration {
    pub optimal_params: EngineParams,
    pub predicted_thrust: f64,
    pub optimization_value: f64,
    /// Objective evaluations spent by the minimizer.
    pub evaluations: usize,
}

/// Optimizer outcome. Non-convergence is a value, not an error.
///
/// Serialized flat with a boolean `success` discriminant:
/// `{"success": true, "optimal_params": ..}` or `{"success": false, "error": ".."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "OptimizationWire", try_from = "OptimizationWire")]
pub enum OptimizationOutcome {
    Converged(OptimalConfiguration),
    NotConverged { error: String },
}

impl OptimizationOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Converged(_))
    }

    pub const fn configuration(&self) -> Option<&OptimalConfiguration> {
        match self {
            Self::Converged(config) => Some(config),
            Self::NotConverged { .. } => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct OptimizationWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    optimal_params: Option<EngineParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    predicted_thrust: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    optimization_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    evaluations: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<OptimizationOutcome> for OptimizationWire {
    fn from(outcome: OptimizationOutcome) -> Self {
        match outcome {
            OptimizationOutcome::Converged(c) => Self {
                success: true,
                optimal_params: Some(c.optimal_params),
                predicted_thrust: Some(c.predicted_thrust),
                optimization_value: Some(c.optimization_value),
                evaluations: Some(c.evaluations),
                error: None,
            },
            OptimizationOutcome::NotConverged { error } => Self {
                success: false,
                optimal_params: None,
                predicted_thrust: None,
                optimization_value: None,
                evaluations: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<OptimizationWire> for OptimizationOutcome {
    type Error = String;

    fn try_from(wire: OptimizationWire) -> Result<Self, Self::Error> {
        if !wire.success {
            return Ok(Self::NotConverged {
                error: wire.error.unwrap_or_default(),
            });
        }
        match (wire.optimal_params, wire.predicted_thrust, wire.optimization_value) {
            (Some(optimal_params), Some(predicted_thrust), Some(optimization_value)) => {
                Ok(Self::Converged(OptimalConfiguration {
                    optimal_params,
                    predicted_thrust,
                    optimization_value,
                    evaluations: wire.evaluations.unwrap_or(0),
                }))
            }
            _ => Err("successful optimization is missing its configuration".to_string()),
        }
    }
}

/// Forest hyperparameters chosen by grid search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

/// Held-out evaluation of a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mae: f64,
    pub r2: f64,
    pub train_size: usize,
    pub test_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_params: Option<BestParams>,
}

/// Full payload stored for a completed experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    pub simulation: SimulationResult,
    pub optimization: Option<OptimizationOutcome>,
    pub model_metrics: ModelMetrics,
}
