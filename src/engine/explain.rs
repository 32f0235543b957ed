//! Rule-based explanation of a completed experiment.
//!
//! Thresholds bucket each input into low / moderate / high and map the bucket
//! to a fixed physical rationale. Suggestions always cover temperature,
//! pressure and mixture ratio, in that order.

use serde::{Deserialize, Serialize};

use crate::types::{EngineParams, ExperimentParams, ExperimentResults};

/// Thrust (kN) banding for the summary sentence.
mod performance {
    pub const HIGH: f64 = 300.0;
    pub const MODERATE: f64 = 200.0;
}

/// `(low, high)` thresholds for the physical reasons.
mod reason_thresholds {
    pub const TEMP: (f64, f64) = (2800.0, 3500.0);
    pub const PRESSURE: (f64, f64) = (3.0, 7.0);
    pub const O_F_RATIO: (f64, f64) = (2.5, 4.5);
}

/// Expected direction of change for a suggested experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub experiment: String,
    pub expected_thrust: Direction,
    pub expected_temperature: Direction,
    pub risk: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub summary: String,
    pub physical_reasons: Vec<String>,
    pub suggestions: Vec<Suggestion>,
    pub beginner_explanation: String,
}

/// Explain a finished run in plain language and propose follow-up experiments.
pub fn explain_run(params: &ExperimentParams, results: &ExperimentResults) -> Explanation {
    let engine = params.engine();
    let thrust = results.simulation.thrust;

    Explanation {
        summary: summary(thrust, engine.temp),
        physical_reasons: physical_reasons(&engine),
        suggestions: suggestions(&engine),
        beginner_explanation: beginner_explanation(thrust, engine.temp),
    }
}

fn summary(thrust: f64, temp: f64) -> String {
    let band = if thrust > performance::HIGH {
        "high"
    } else if thrust > performance::MODERATE {
        "moderate"
    } else {
        "low"
    };
    format!(
        "The rocket configuration achieved {band} performance with {thrust:.1} kN thrust at {temp:.0}K combustion temperature."
    )
}

fn physical_reasons(engine: &EngineParams) -> Vec<String> {
    let pick = |value: f64, (low, high): (f64, f64), [hi, lo, mid]: [&str; 3]| {
        let reason = if value > high {
            hi
        } else if value < low {
            lo
        } else {
            mid
        };
        reason.to_string()
    };

    vec![
        pick(
            engine.temp,
            reason_thresholds::TEMP,
            [
                "High combustion temperature increases molecular kinetic energy, boosting exhaust velocity and thrust.",
                "Lower combustion temperature reduces exhaust velocity, limiting thrust potential.",
                "Moderate combustion temperature provides balanced performance between thrust and thermal stress.",
            ],
        ),
        pick(
            engine.pressure,
            reason_thresholds::PRESSURE,
            [
                "High chamber pressure increases mass flow rate through the nozzle, directly boosting thrust output.",
                "Low chamber pressure limits mass flow rate, reducing overall thrust generation.",
                "Moderate chamber pressure provides stable combustion with reasonable thrust levels.",
            ],
        ),
        pick(
            engine.o_f_ratio,
            reason_thresholds::O_F_RATIO,
            [
                "High oxidizer-to-fuel ratio may cause incomplete combustion, reducing efficiency despite excess oxidizer.",
                "Low oxidizer-to-fuel ratio creates fuel-rich conditions, potentially reducing combustion temperature.",
                "Balanced oxidizer-to-fuel ratio promotes complete combustion and optimal energy release.",
            ],
        ),
    ]
}

fn suggestions(engine: &EngineParams) -> Vec<Suggestion> {
    use Direction::{Negative, Neutral, Positive};

    let suggest = |experiment: String, thrust, temperature, risk: &str| Suggestion {
        experiment,
        expected_thrust: thrust,
        expected_temperature: temperature,
        risk: risk.to_string(),
    };

    let temp = if engine.temp < 3500.0 {
        suggest(
            format!("Increase combustion temperature to {:.0}K", engine.temp + 300.0),
            Positive,
            Positive,
            "Higher thermal stress on combustion chamber materials",
        )
    } else {
        suggest(
            format!("Decrease combustion temperature to {:.0}K", engine.temp - 200.0),
            Negative,
            Negative,
            "Reduced performance but improved material longevity",
        )
    };

    let pressure = if engine.pressure < 8.0 {
        suggest(
            format!("Increase chamber pressure to {:.1} MPa", engine.pressure + 1.5),
            Positive,
            Neutral,
            "Higher structural loads requiring stronger chamber design",
        )
    } else {
        suggest(
            format!("Decrease chamber pressure to {:.1} MPa", engine.pressure - 1.0),
            Negative,
            Neutral,
            "Reduced thrust but lower structural requirements",
        )
    };

    let ratio = if engine.o_f_ratio < 4.0 {
        suggest(
            format!("Increase O/F ratio to {:.1}", engine.o_f_ratio + 0.5),
            Positive,
            Positive,
            "Potential oxidizer-rich combustion affecting engine components",
        )
    } else {
        suggest(
            format!("Decrease O/F ratio to {:.1}", engine.o_f_ratio - 0.3),
            Negative,
            Negative,
            "Fuel-rich combustion may cause carbon buildup",
        )
    };

    vec![temp, pressure, ratio]
}

fn beginner_explanation(thrust: f64, temp: f64) -> String {
    format!(
        "Think of a rocket engine like a controlled explosion in a metal chamber. The fuel and oxidizer \
         mix and burn at {temp:.0}K (about {oven:.1} times hotter than your oven!), creating hot gases that \
         rush out the back at incredible speed. This produces {thrust:.1} kN of thrust, roughly the force of \
         {people:.0} people pushing together. The key is balancing the mixture: too much fuel wastes oxidizer, \
         too much oxidizer can damage the engine, and the right balance gives maximum push while keeping \
         everything from melting. Higher temperatures and pressures generally mean more thrust, but also more \
         stress on the engine materials.",
        oven = temp / 1000.0,
        people = thrust * 100.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ModelMetrics, SimulationResult};

    fn results_with_thrust(params: &ExperimentParams, thrust: f64) -> ExperimentResults {
        ExperimentResults {
            simulation: SimulationResult {
                thrust,
                efficiency: thrust / (params.pressure * params.isp),
                temperature_ratio: params.temp / 3000.0,
                params: params.engine(),
            },
            optimization: None,
            model_metrics: ModelMetrics {
                mae: 1.0,
                r2: 0.99,
                train_size: 400,
                test_size: 100,
                best_params: None,
            },
        }
    }

    #[test]
    fn test_summary_banding() {
        let params = ExperimentParams::new(3.5, 5.0, 3000.0, 300.0);
        for (thrust, band) in [(350.0, "high"), (250.0, "moderate"), (120.0, "low")] {
            let e = explain_run(&params, &results_with_thrust(&params, thrust));
            assert!(e.summary.contains(&format!("{band} performance")), "{}", e.summary);
        }
    }

    #[test]
    fn test_moderate_inputs() {
        let params = ExperimentParams::new(3.5, 5.0, 3000.0, 300.0);
        let e = explain_run(&params, &results_with_thrust(&params, 1471.5));

        assert_eq!(e.physical_reasons.len(), 3);
        assert!(e.physical_reasons[0].starts_with("Moderate combustion temperature"));
        assert!(e.physical_reasons[1].starts_with("Moderate chamber pressure"));
        assert!(e.physical_reasons[2].starts_with("Balanced oxidizer-to-fuel"));
        assert!(e.beginner_explanation.contains("1471.5 kN"));
    }

    #[test]
    fn test_extreme_inputs() {
        let params = ExperimentParams::new(5.0, 9.0, 4000.0, 300.0);
        let e = explain_run(&params, &results_with_thrust(&params, 2600.0));

        assert!(e.physical_reasons[0].starts_with("High combustion temperature"));
        assert!(e.physical_reasons[1].starts_with("High chamber pressure"));
        assert!(e.physical_reasons[2].starts_with("High oxidizer-to-fuel"));

        assert_eq!(e.suggestions.len(), 3);
        assert_eq!(e.suggestions[0].experiment, "Decrease combustion temperature to 3800K");
        assert_eq!(e.suggestions[1].experiment, "Decrease chamber pressure to 8.0 MPa");
        assert_eq!(e.suggestions[2].experiment, "Decrease O/F ratio to 4.7");
        assert_eq!(e.suggestions[1].expected_temperature, Direction::Neutral);
    }

    #[test]
    fn test_increase_suggestions() {
        let params = ExperimentParams::new(2.0, 2.0, 2600.0, 300.0);
        let e = explain_run(&params, &results_with_thrust(&params, 100.0));

        assert!(e.physical_reasons[0].starts_with("Lower combustion temperature"));
        assert!(e.physical_reasons[1].starts_with("Low chamber pressure"));
        assert!(e.physical_reasons[2].starts_with("Low oxidizer-to-fuel"));
        assert_eq!(e.suggestions[0].experiment, "Increase combustion temperature to 2900K");
        assert_eq!(e.suggestions[1].experiment, "Increase chamber pressure to 3.5 MPa");
        assert_eq!(e.suggestions[2].experiment, "Increase O/F ratio to 2.5");
        assert!(e
            .suggestions
            .iter()
            .all(|s| s.expected_thrust == Direction::Positive));
    }

    #[test]
    fn test_direction_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Direction::Neutral).unwrap(), "\"neutral\"");
    }
}
