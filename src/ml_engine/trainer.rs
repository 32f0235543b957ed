//! Model training with optional grid-search hyperparameter tuning.
//!
//! ## Procedure
//! 1. Validate the dataset
//! 2. Shuffle and hold out `test_fraction` of the rows
//! 3. Either fit the default forest, or grid-search the forest parameters
//!    with k-fold cross-validation scored by negative mean absolute error
//! 4. Report MAE and R² on the held-out rows

use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::dataset::{DatasetError, RocketDataset};
use super::forest::{ForestError, ForestParams, RandomForest};
use super::metrics::{compute_metrics, mean_absolute_error};
use super::{FeatureRow, ThrustPredictor};
use crate::types::{BestParams, ModelMetrics};

/// Hyperparameter grid searched when tuning is enabled.
pub mod param_grid {
    pub const N_ESTIMATORS: [usize; 2] = [50, 100];
    pub const MAX_DEPTH: [Option<usize>; 2] = [None, Some(10)];
    pub const MIN_SAMPLES_SPLIT: [usize; 2] = [2, 5];
    /// Cross-validation folds per candidate.
    pub const CV_FOLDS: usize = 3;
}

/// Training configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingOptions {
    pub tune_hyperparams: bool,
    /// Share of rows held out for evaluation.
    pub test_fraction: f64,
    /// Seed for the split shuffle and the forest bootstrap.
    pub seed: u64,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            tune_hyperparams: false,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Training failures.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("invalid dataset: {0}")]
    Dataset(#[from] DatasetError),
    #[error("model fitting failed: {0}")]
    Forest(#[from] ForestError),
    #[error("need at least {needed} samples to train, got {got}")]
    TooFewSamples { needed: usize, got: usize },
    #[error("test_fraction must be in (0, 1), got {0}")]
    InvalidTestFraction(f64),
    #[error("model file I/O error ({path}): {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("model serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A fitted forest together with its held-out evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub forest: RandomForest,
    pub metrics: ModelMetrics,
}

impl ThrustPredictor for TrainedModel {
    fn predict_thrust(&self, features: &FeatureRow) -> f64 {
        self.forest.predict_one(features)
    }
}

impl TrainedModel {
    /// Write the model as JSON, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), TrainError> {
        let io_err = |source| TrainError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let bytes = serde_json::to_vec(self)?;
        std::fs::write(path, bytes).map_err(io_err)?;
        info!(path = %path.display(), "Model saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, TrainError> {
        let bytes = std::fs::read(path).map_err(|source| TrainError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let model: Self = serde_json::from_slice(&bytes)?;
        info!(path = %path.display(), trees = model.forest.n_trees(), "Model loaded");
        Ok(model)
    }
}

/// Fit a thrust model on `dataset`.
pub fn train_model(dataset: &RocketDataset, options: &TrainingOptions) -> Result<TrainedModel, TrainError> {
    dataset.validate()?;

    if !(options.test_fraction > 0.0 && options.test_fraction < 1.0) {
        return Err(TrainError::InvalidTestFraction(options.test_fraction));
    }

    let needed = if options.tune_hyperparams {
        2 * param_grid::CV_FOLDS + 1
    } else {
        2
    };
    if dataset.len() < needed {
        return Err(TrainError::TooFewSamples {
            needed,
            got: dataset.len(),
        });
    }

    let x = dataset.features();
    let y = dataset.targets();
    let split = train_test_split(x.len(), options.test_fraction, options.seed);
    if split.train.len() < needed - 1 {
        return Err(TrainError::TooFewSamples {
            needed,
            got: dataset.len(),
        });
    }

    let (x_train, y_train) = select(&x, &y, &split.train);
    let (x_test, y_test) = select(&x, &y, &split.test);

    let (params, best_params) = if options.tune_hyperparams {
        let best = grid_search(&x_train, &y_train, options.seed)?;
        info!(
            n_estimators = best.n_estimators,
            max_depth = ?best.max_depth,
            min_samples_split = best.min_samples_split,
            "Grid search selected parameters"
        );
        (
            ForestParams {
                n_estimators: best.n_estimators,
                max_depth: best.max_depth,
                min_samples_split: best.min_samples_split,
                seed: options.seed,
            },
            Some(best),
        )
    } else {
        (
            ForestParams {
                seed: options.seed,
                ..ForestParams::default()
            },
            None,
        )
    };

    let forest = RandomForest::fit(&x_train, &y_train, params)?;
    let predictions = forest.predict(&x_test);
    let evaluation = compute_metrics(x_test.len(), &predictions, &y_test);

    let metrics = ModelMetrics {
        mae: evaluation.mae,
        r2: evaluation.r2,
        train_size: x_train.len(),
        test_size: evaluation.data_points,
        best_params,
    };

    info!(
        mae = metrics.mae,
        r2 = metrics.r2,
        rmse = evaluation.rmse,
        train_size = metrics.train_size,
        test_size = metrics.test_size,
        tuned = options.tune_hyperparams,
        "Model trained"
    );

    Ok(TrainedModel { forest, metrics })
}

struct Split {
    train: Vec<usize>,
    test: Vec<usize>,
}

/// Shuffle row indices and hold out `ceil(n × test_fraction)` of them.
fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Split {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);

    let train = indices.split_off(n_test);
    Split {
        train,
        test: indices,
    }
}

fn select(x: &[FeatureRow], y: &[f64], rows: &[usize]) -> (Vec<FeatureRow>, Vec<f64>) {
    rows.iter().map(|&i| (x[i], y[i])).unzip()
}

fn candidates() -> Vec<BestParams> {
    let mut out = Vec::new();
    for &n_estimators in &param_grid::N_ESTIMATORS {
        for &max_depth in &param_grid::MAX_DEPTH {
            for &min_samples_split in &param_grid::MIN_SAMPLES_SPLIT {
                out.push(BestParams {
                    n_estimators,
                    max_depth,
                    min_samples_split,
                });
            }
        }
    }
    out
}

/// Score every grid candidate by k-fold negative MAE and return the best.
///
/// Ties keep the earliest candidate in grid order.
fn grid_search(x: &[FeatureRow], y: &[f64], seed: u64) -> Result<BestParams, TrainError> {
    let grid = candidates();
    let scores = grid
        .par_iter()
        .map(|candidate| cross_val_score(x, y, candidate, seed))
        .collect::<Result<Vec<f64>, ForestError>>()?;

    let mut best = 0;
    for (i, score) in scores.iter().enumerate() {
        debug!(candidate = ?grid[i], score, "Grid candidate scored");
        if *score > scores[best] {
            best = i;
        }
    }
    Ok(grid[best])
}

/// Mean negative MAE over contiguous, unshuffled folds.
fn cross_val_score(
    x: &[FeatureRow],
    y: &[f64],
    candidate: &BestParams,
    seed: u64,
) -> Result<f64, ForestError> {
    let n = x.len();
    let k = param_grid::CV_FOLDS;
    let params = ForestParams {
        n_estimators: candidate.n_estimators,
        max_depth: candidate.max_depth,
        min_samples_split: candidate.min_samples_split,
        seed,
    };

    let mut total = 0.0;
    for fold in 0..k {
        // First `n % k` folds take one extra row.
        let start = fold * (n / k) + fold.min(n % k);
        let len = n / k + usize::from(fold < n % k);
        let end = start + len;

        let train: Vec<usize> = (0..start).chain(end..n).collect();
        let (x_fit, y_fit) = select(x, y, &train);
        let forest = RandomForest::fit(&x_fit, &y_fit, params)?;
        let predictions = forest.predict(&x[start..end]);
        total -= mean_absolute_error(&y[start..end], &predictions);
    }
    Ok(total / k as f64)
}
