//! Synthetic training data and dataset validation.
//!
//! Thrust follows `isp × pressure × g₀ × 0.1` (kN); ratio and temperature are
//! present as features but carry no signal in the synthetic corpus.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Standard gravity (m/s²).
const G0: f64 = 9.81;

/// Generation bounds for the synthetic corpus.
pub mod generation_bounds {
    pub const O_F_RATIO: (f64, f64) = (2.0, 6.0);
    pub const PRESSURE: (f64, f64) = (1.0, 10.0);
    pub const TEMP: (f64, f64) = (2500.0, 4000.0);
    pub const ISP: (f64, f64) = (200.0, 450.0);
}

/// Plausibility ranges a supplied dataset must satisfy before training.
pub mod plausible_ranges {
    pub const O_F_RATIO: (f64, f64) = (1.0, 10.0);
    pub const PRESSURE: (f64, f64) = (0.1, 20.0);
    pub const TEMP: (f64, f64) = (1000.0, 6000.0);
}

/// One observed engine configuration and its thrust.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineSample {
    pub o_f_ratio: f64,
    pub pressure: f64,
    pub temp: f64,
    pub isp: f64,
    /// Thrust (kN).
    pub thrust: f64,
}

impl EngineSample {
    pub const fn features(&self) -> [f64; 4] {
        [self.o_f_ratio, self.pressure, self.temp, self.isp]
    }
}

/// Thrust implied by the synthetic physics model.
pub fn synthetic_thrust(pressure: f64, isp: f64) -> f64 {
    isp * pressure * G0 * 0.1
}

/// Column-oriented view of a set of samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RocketDataset {
    samples: Vec<EngineSample>,
}

impl RocketDataset {
    pub const fn from_samples(samples: Vec<EngineSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[EngineSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn features(&self) -> Vec<[f64; 4]> {
        self.samples.iter().map(EngineSample::features).collect()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.thrust).collect()
    }

    /// Check a supplied dataset for non-finite values and implausible ranges.
    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.samples.is_empty() {
            return Err(DatasetError::Empty);
        }

        for (row, s) in self.samples.iter().enumerate() {
            let values = [s.o_f_ratio, s.pressure, s.temp, s.isp, s.thrust];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(DatasetError::NonFinite { row });
            }
        }

        let checks = [
            ("O/F Ratio", plausible_ranges::O_F_RATIO, self.column(|s| s.o_f_ratio)),
            ("Chamber Pressure", plausible_ranges::PRESSURE, self.column(|s| s.pressure)),
            ("Combustion Temperature", plausible_ranges::TEMP, self.column(|s| s.temp)),
        ];
        for (column, (lo, hi), values) in checks {
            let (min, max) = min_max(&values);
            if min < lo || max > hi {
                return Err(DatasetError::OutOfRange { column, lo, hi });
            }
        }

        Ok(())
    }

    fn column(&self, f: impl Fn(&EngineSample) -> f64) -> Vec<f64> {
        self.samples.iter().map(f).collect()
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Reasons a dataset is unusable for training.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DatasetError {
    #[error("dataset is empty")]
    Empty,
    #[error("row {row} contains a non-finite value")]
    NonFinite { row: usize },
    #[error("{column} values out of reasonable range ({lo}-{hi})")]
    OutOfRange {
        column: &'static str,
        lo: f64,
        hi: f64,
    },
}

/// Generate a reproducible synthetic corpus of `size` samples.
pub fn generate_data(seed: u64, size: usize) -> RocketDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut draw = |(lo, hi): (f64, f64)| rng.gen_range(lo..=hi);

    let samples = (0..size)
        .map(|_| {
            let o_f_ratio = draw(generation_bounds::O_F_RATIO);
            let pressure = draw(generation_bounds::PRESSURE);
            let temp = draw(generation_bounds::TEMP);
            let isp = draw(generation_bounds::ISP);
            EngineSample {
                o_f_ratio,
                pressure,
                temp,
                isp,
                thrust: synthetic_thrust(pressure, isp),
            }
        })
        .collect();

    RocketDataset::from_samples(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_data_size() {
        let data = generate_data(42, 100);
        assert_eq!(data.len(), 100);
        assert_eq!(data.features().len(), 100);
        assert_eq!(data.targets().len(), 100);
    }

    #[test]
    fn test_generate_data_reproducible() {
        assert_eq!(generate_data(42, 50), generate_data(42, 50));
        assert_ne!(generate_data(42, 50), generate_data(7, 50));
    }

    #[test]
    fn test_generated_values_within_bounds() {
        use generation_bounds::*;
        let within = |v: f64, (lo, hi): (f64, f64)| (lo..=hi).contains(&v);
        for s in generate_data(3, 500).samples() {
            assert!(within(s.o_f_ratio, O_F_RATIO));
            assert!(within(s.pressure, PRESSURE));
            assert!(within(s.temp, TEMP));
            assert!(within(s.isp, ISP));
            assert!(s.thrust > 0.0);
        }
    }

    #[test]
    fn test_generated_data_validates() {
        assert!(generate_data(42, 200).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_implausible_pressure() {
        let mut samples = generate_data(42, 10).samples().to_vec();
        samples[4].pressure = 25.0;
        let err = RocketDataset::from_samples(samples).validate().unwrap_err();
        assert!(matches!(err, DatasetError::OutOfRange { column: "Chamber Pressure", .. }));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mut samples = generate_data(42, 10).samples().to_vec();
        samples[2].thrust = f64::NAN;
        let err = RocketDataset::from_samples(samples).validate().unwrap_err();
        assert_eq!(err, DatasetError::NonFinite { row: 2 });
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert_eq!(RocketDataset::default().validate(), Err(DatasetError::Empty));
    }
}
