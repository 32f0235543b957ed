//! Trained-model cache shared by all experiment jobs.
//!
//! One slot per [`ModelProfile`]. Each slot's mutex is held while the slot is
//! populated, so concurrent first use trains once and later callers share the
//! same `Arc`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::dataset::generate_data;
use super::trainer::{train_model, TrainError, TrainedModel, TrainingOptions};

/// Which trained variant a job asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProfile {
    /// Fixed forest parameters.
    Default,
    /// Grid-searched forest parameters.
    Tuned,
}

impl ModelProfile {
    pub const fn from_tune_flag(tune: bool) -> Self {
        if tune {
            Self::Tuned
        } else {
            Self::Default
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Tuned => "tuned",
        }
    }
}

/// How the cache builds models on a miss.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Seed for synthetic data, split and forest.
    pub seed: u64,
    /// Synthetic samples generated per training run.
    pub samples: usize,
    pub test_fraction: f64,
    /// Directory for persisted models. `None` keeps models in memory only.
    pub cache_dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            samples: 500,
            test_fraction: 0.2,
            cache_dir: None,
        }
    }
}

type Slot = Mutex<Option<Arc<TrainedModel>>>;

pub struct ModelCache {
    settings: CacheSettings,
    default: Slot,
    tuned: Slot,
}

impl ModelCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            default: Mutex::new(None),
            tuned: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn slot(&self, profile: ModelProfile) -> &Slot {
        match profile {
            ModelProfile::Default => &self.default,
            ModelProfile::Tuned => &self.tuned,
        }
    }

    /// Cached model for `profile`, if one has been built.
    pub fn get(&self, profile: ModelProfile) -> Option<Arc<TrainedModel>> {
        self.slot(profile)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the cached model for `profile`, loading or training it first
    /// if the slot is empty. Blocks; call from a blocking context.
    pub fn get_or_train(&self, profile: ModelProfile) -> Result<Arc<TrainedModel>, TrainError> {
        let mut slot = self.slot(profile).lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }

        let model = match self.load_persisted(profile) {
            Some(model) => model,
            None => {
                let model = self.train(profile)?;
                self.persist(profile, &model);
                model
            }
        };

        let model = Arc::new(model);
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Drop every cached model. Persisted files are left in place.
    pub fn clear(&self) {
        for profile in [ModelProfile::Default, ModelProfile::Tuned] {
            self.slot(profile)
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
        info!("Model cache cleared");
    }

    fn model_path(&self, profile: ModelProfile) -> Option<PathBuf> {
        self.settings
            .cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("thrust_model_{}.json", profile.as_str())))
    }

    fn train(&self, profile: ModelProfile) -> Result<TrainedModel, TrainError> {
        info!(profile = profile.as_str(), samples = self.settings.samples, "Training thrust model");
        let data = generate_data(self.settings.seed, self.settings.samples);
        let options = TrainingOptions {
            tune_hyperparams: profile == ModelProfile::Tuned,
            test_fraction: self.settings.test_fraction,
            seed: self.settings.seed,
        };
        train_model(&data, &options)
    }

    fn load_persisted(&self, profile: ModelProfile) -> Option<TrainedModel> {
        let path = self.model_path(profile)?;
        if !path.exists() {
            return None;
        }
        match TrainedModel::load(&path) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable model file, retraining");
                None
            }
        }
    }

    fn persist(&self, profile: ModelProfile, model: &TrainedModel) {
        if let Some(path) = self.model_path(profile) {
            if let Err(e) = model.save(&path) {
                warn!(path = %path.display(), error = %e, "Failed to persist trained model");
            }
        }
    }
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
