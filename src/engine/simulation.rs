//! Single-configuration engine simulation.
//!
//! Thrust comes from the trained predictor; efficiency and temperature ratio
//! are derived from it.

use crate::ml_engine::ThrustPredictor;
use crate::types::{EngineParams, SimulationResult};

/// Reference combustion temperature (K) for `temperature_ratio`.
pub const REFERENCE_TEMP: f64 = 3000.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("non-finite engine input: {field} = {value}")]
    NonFiniteInput { field: &'static str, value: f64 },
    #[error("model returned a non-finite thrust ({0}) for the given configuration")]
    NonFinitePrediction(f64),
}

/// Predict thrust for one engine configuration and derive the summary ratios.
///
/// `efficiency = thrust / (pressure × isp)`, `temperature_ratio = temp / 3000`.
pub fn simulate(
    params: &EngineParams,
    model: &dyn ThrustPredictor,
) -> Result<SimulationResult, EngineError> {
    let fields = [
        ("O_F_ratio", params.o_f_ratio),
        ("pressure", params.pressure),
        ("temp", params.temp),
        ("isp", params.isp),
    ];
    if let Some(&(field, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
        return Err(EngineError::NonFiniteInput { field, value });
    }

    let thrust = model.predict_thrust(&params.features());
    if !thrust.is_finite() {
        return Err(EngineError::NonFinitePrediction(thrust));
    }

    Ok(SimulationResult {
        thrust,
        efficiency: thrust / (params.pressure * params.isp),
        temperature_ratio: params.temp / REFERENCE_TEMP,
        params: *params,
    })
}
