//! Thrust surrogate model
//!
//! A random-forest regressor trained on synthetic engine data, used by the
//! simulator and the fuel-mixture optimizer to predict thrust from
//! `[O/F ratio, chamber pressure, combustion temperature, specific impulse]`.
//!
//! ## Architecture
//! - `dataset`: Synthetic corpus generation and dataset validation
//! - `forest`: CART regression trees bagged into a random forest (rayon)
//! - `metrics`: MAE / RMSE / R² evaluation
//! - `trainer`: Train/test split, optional grid search, model persistence
//! - `cache`: Per-profile trained-model cache shared across jobs

pub mod cache;
pub mod dataset;
pub mod forest;
pub mod metrics;
pub mod trainer;

/// Number of input features per row.
pub const N_FEATURES: usize = 4;

/// `[o_f_ratio, pressure, temp, isp]`
pub type FeatureRow = [f64; N_FEATURES];

/// Anything that can map an engine configuration to a thrust estimate (kN).
pub trait ThrustPredictor: Send + Sync {
    fn predict_thrust(&self, features: &FeatureRow) -> f64;
}

pub use cache::{CacheSettings, ModelCache, ModelProfile};
pub use dataset::{generate_data, DatasetError, EngineSample, RocketDataset};
pub use forest::{ForestError, ForestParams, RandomForest};
pub use metrics::{compute_metrics, RegressionMetrics};
pub use trainer::{train_model, TrainError, TrainedModel, TrainingOptions};
