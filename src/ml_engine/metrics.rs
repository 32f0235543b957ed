//! Regression evaluation metrics.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Summary of prediction quality over a sample set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub r2: f64,
    pub rmse: f64,
    pub data_points: usize,
}

/// Mean absolute error. Zero for empty input.
pub fn mean_absolute_error(actuals: &[f64], predictions: &[f64]) -> f64 {
    if actuals.is_empty() {
        return 0.0;
    }
    let total: f64 = actuals
        .iter()
        .zip(predictions)
        .map(|(a, p)| (a - p).abs())
        .sum();
    total / actuals.len() as f64
}

/// Root mean squared error. Zero for empty input.
pub fn root_mean_squared_error(actuals: &[f64], predictions: &[f64]) -> f64 {
    if actuals.is_empty() {
        return 0.0;
    }
    let total: f64 = actuals
        .iter()
        .zip(predictions)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    (total / actuals.len() as f64).sqrt()
}

/// Coefficient of determination.
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(actuals: &[f64], predictions: &[f64]) -> f64 {
    if actuals.is_empty() {
        return 0.0;
    }
    let mean = actuals.mean();
    let ss_tot: f64 = actuals.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actuals
        .iter()
        .zip(predictions)
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Evaluate `predictions` against `actuals` over `data_points` input rows.
pub fn compute_metrics(data_points: usize, predictions: &[f64], actuals: &[f64]) -> RegressionMetrics {
    RegressionMetrics {
        mae: mean_absolute_error(actuals, predictions),
        r2: r2_score(actuals, predictions),
        rmse: root_mean_squared_error(actuals, predictions),
        data_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_metrics() {
        let predictions = [1.1, 2.1, 2.9];
        let actuals = [1.0, 2.0, 3.0];
        let m = compute_metrics(3, &predictions, &actuals);

        assert_eq!(m.data_points, 3);
        assert!((m.mae - 0.1).abs() < 1e-9);
        assert!((m.rmse - 0.1).abs() < 1e-9);
        assert!(m.r2 > 0.0 && m.r2 <= 1.0);
        assert!((m.r2 - 0.985).abs() < 1e-9);
    }

    #[test]
    fn test_perfect_predictions() {
        let values = [4.0, 8.0, 15.0, 16.0];
        assert_eq!(r2_score(&values, &values), 1.0);
        assert_eq!(mean_absolute_error(&values, &values), 0.0);
    }

    #[test]
    fn test_constant_target_r2() {
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r2_score(&[2.0, 2.0], &[1.0, 3.0]), 0.0);
    }

    #[test]
    fn test_empty_input() {
        let m = compute_metrics(0, &[], &[]);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.r2, 0.0);
    }
}
