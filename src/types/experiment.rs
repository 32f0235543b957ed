//! Experiment request parameters and intake validation.

use serde::{Deserialize, Serialize};

/// Declared parameter bounds, shared by intake validation, data generation
/// and the optimizer.
pub mod bounds {
    /// Oxidizer-to-fuel mass ratio.
    pub const O_F_RATIO: (f64, f64) = (2.0, 6.0);
    /// Chamber pressure (MPa).
    pub const PRESSURE: (f64, f64) = (1.0, 10.0);
    /// Combustion temperature accepted at intake and searched by the optimizer (K).
    pub const TEMP: (f64, f64) = (2500.0, 5000.0);
    /// Specific impulse (s).
    pub const ISP: (f64, f64) = (200.0, 450.0);
    /// Thrust/temperature trade-off weight.
    pub const ALPHA: (f64, f64) = (0.0, 1.0);
}

/// Default optimization weight when the request omits `alpha`.
pub const DEFAULT_ALPHA: f64 = 0.5;

/// Default temperature ceiling when the request omits `max_temp` (K).
pub const DEFAULT_MAX_TEMP: f64 = 4000.0;

/// The four physical inputs of an engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineParams {
    #[serde(rename = "O_F_ratio")]
    pub o_f_ratio: f64,
    pub pressure: f64,
    pub temp: f64,
    pub isp: f64,
}

impl EngineParams {
    pub const fn new(o_f_ratio: f64, pressure: f64, temp: f64, isp: f64) -> Self {
        Self {
            o_f_ratio,
            pressure,
            temp,
            isp,
        }
    }

    /// Feature vector in model column order.
    pub const fn features(&self) -> [f64; 4] {
        [self.o_f_ratio, self.pressure, self.temp, self.isp]
    }
}

/// A submitted experiment: engine configuration plus optimization tuning.
///
/// `alpha` defaults to 0.5 when absent; an explicit `null` disables the
/// optimization step entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentParams {
    #[serde(rename = "O_F_ratio")]
    pub o_f_ratio: f64,
    pub pressure: f64,
    pub temp: f64,
    pub isp: f64,
    #[serde(default = "default_alpha")]
    pub alpha: Option<f64>,
    #[serde(default = "default_max_temp")]
    pub max_temp: Option<f64>,
    #[serde(default)]
    pub tune_model: Option<bool>,
    /// Per-request override of the configured impulse search mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimize_isp: Option<bool>,
}

#[allow(clippy::unnecessary_wraps)]
const fn default_alpha() -> Option<f64> {
    Some(DEFAULT_ALPHA)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_max_temp() -> Option<f64> {
    Some(DEFAULT_MAX_TEMP)
}

impl ExperimentParams {
    /// Build a request with the default tuning fields.
    pub const fn new(o_f_ratio: f64, pressure: f64, temp: f64, isp: f64) -> Self {
        Self {
            o_f_ratio,
            pressure,
            temp,
            isp,
            alpha: Some(DEFAULT_ALPHA),
            max_temp: Some(DEFAULT_MAX_TEMP),
            tune_model: Some(false),
            optimize_isp: None,
        }
    }

    pub const fn engine(&self) -> EngineParams {
        EngineParams::new(self.o_f_ratio, self.pressure, self.temp, self.isp)
    }

    pub fn max_temp_or_default(&self) -> f64 {
        self.max_temp.unwrap_or(DEFAULT_MAX_TEMP)
    }

    pub fn tune_model(&self) -> bool {
        self.tune_model.unwrap_or(false)
    }

    /// Range-check every field, collecting all violations.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        check_range("O_F_ratio", self.o_f_ratio, bounds::O_F_RATIO, &mut errors);
        check_range("pressure", self.pressure, bounds::PRESSURE, &mut errors);
        check_range("temp", self.temp, bounds::TEMP, &mut errors);
        check_range("isp", self.isp, bounds::ISP, &mut errors);

        if let Some(alpha) = self.alpha {
            check_range("alpha", alpha, bounds::ALPHA, &mut errors);
        }

        if let Some(max_temp) = self.max_temp {
            if !max_temp.is_finite() || max_temp <= 0.0 {
                errors.push(FieldError {
                    field: "max_temp".to_string(),
                    message: format!("max_temp must be a positive finite value, got {max_temp}"),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { errors })
        }
    }
}

fn check_range(field: &str, value: f64, (lo, hi): (f64, f64), errors: &mut Vec<FieldError>) {
    // NaN fails `contains`, so non-finite values are rejected here too.
    if !(lo..=hi).contains(&value) {
        errors.push(FieldError {
            field: field.to_string(),
            message: format!("{field} must be between {lo} and {hi}, got {value}"),
        });
    }
}

/// A single out-of-range field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Intake validation failure listing every offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid experiment parameters: {}", summarize(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_params_validate() {
        let params = ExperimentParams::new(3.5, 5.0, 3000.0, 300.0);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_ratio_rejected() {
        let params = ExperimentParams::new(10.0, 5.0, 3000.0, 300.0);
        let err = params.validate().unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].field, "O_F_ratio");
    }

    #[test]
    fn test_all_violations_collected() {
        let mut params = ExperimentParams::new(1.0, 11.0, 2000.0, 500.0);
        params.alpha = Some(1.5);
        params.max_temp = Some(-1.0);
        let err = params.validate().unwrap_err();
        let fields: Vec<_> = err.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            ["O_F_ratio", "pressure", "temp", "isp", "alpha", "max_temp"]
        );
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let params = ExperimentParams::new(2.0, 10.0, 5000.0, 200.0);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_missing_optionals_take_defaults() {
        let params: ExperimentParams = serde_json::from_str(
            r#"{"O_F_ratio": 3.5, "pressure": 5.0, "temp": 3000.0, "isp": 300.0}"#,
        )
        .unwrap();
        assert_eq!(params.alpha, Some(DEFAULT_ALPHA));
        assert_eq!(params.max_temp, Some(DEFAULT_MAX_TEMP));
        assert!(!params.tune_model());
        assert_eq!(params.optimize_isp, None);
    }

    #[test]
    fn test_null_alpha_disables_optimization() {
        let params: ExperimentParams = serde_json::from_str(
            r#"{"O_F_ratio": 3.5, "pressure": 5.0, "temp": 3000.0, "isp": 300.0, "alpha": null}"#,
        )
        .unwrap();
        assert_eq!(params.alpha, None);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_engine_params_wire_name() {
        let json = serde_json::to_value(EngineParams::new(3.5, 5.0, 3000.0, 300.0)).unwrap();
        assert_eq!(json["O_F_ratio"], 3.5);
        assert_eq!(json["isp"], 300.0);
    }
}
