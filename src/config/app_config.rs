//! Application configuration, loaded from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::defaults;
use crate::ml_engine::CacheSettings;
use crate::optimization::OptimizerSettings;
use crate::types::bounds;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "ROCKET_CONFIG";

/// Config file picked up from the working directory.
pub const LOCAL_CONFIG_FILE: &str = "rocket_config.toml";

/// Top-level configuration. Every section falls back to its defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub workers: WorkerConfig,
    pub model: ModelConfig,
    pub optimizer: OptimizerSettings,
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub data_dir: PathBuf,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: defaults::SERVER_ADDR.to_string(),
            data_dir: PathBuf::from(defaults::DATA_DIR),
            cors_origins: defaults::CORS_ORIGINS.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub count: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: defaults::WORKER_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub seed: u64,
    pub samples: usize,
    pub test_fraction: f64,
    /// Where trained models are persisted. Defaults to `<data_dir>/models`.
    pub cache_path: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            seed: defaults::MODEL_SEED,
            samples: defaults::MODEL_SAMPLES,
            test_fraction: defaults::MODEL_TEST_FRACTION,
            cache_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub cleanup_interval_secs: u64,
    pub max_age_hours: i64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: defaults::CLEANUP_INTERVAL_SECS,
            max_age_hours: defaults::JOB_MAX_AGE_HOURS,
        }
    }
}

impl JobsConfig {
    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Job retention window, clamped to the range `validate` accepts.
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.max_age_hours.clamp(0, defaults::MAX_JOB_AGE_HOURS))
    }
}

impl AppConfig {
    /// Load configuration using the standard search order:
    ///
    /// 1. `ROCKET_CONFIG` environment variable (path to TOML file)
    /// 2. `rocket_config.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// A file that fails to load is logged and skipped.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No config file found, using built-in defaults");
        Self::default()
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every setting, collecting all problems rather than stopping at
    /// the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.server.addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "server.addr '{}' is not a valid socket address",
                self.server.addr
            ));
        }

        if self.workers.count == 0 || self.workers.count > defaults::MAX_WORKER_COUNT {
            errors.push(format!(
                "workers.count ({}) must be between 1 and {}",
                self.workers.count,
                defaults::MAX_WORKER_COUNT
            ));
        }

        if self.model.samples < defaults::MIN_MODEL_SAMPLES {
            errors.push(format!(
                "model.samples ({}) must be at least {}",
                self.model.samples,
                defaults::MIN_MODEL_SAMPLES
            ));
        }
        // NaN fails both comparisons, so test for the valid range instead.
        if !(self.model.test_fraction > 0.0 && self.model.test_fraction < 1.0) {
            errors.push(format!(
                "model.test_fraction ({}) must be in (0, 1)",
                self.model.test_fraction
            ));
        }

        let opt = &self.optimizer;
        if !opt.fixed_impulse.is_finite()
            || opt.fixed_impulse < bounds::ISP.0
            || opt.fixed_impulse > bounds::ISP.1
        {
            errors.push(format!(
                "optimizer.fixed_impulse ({}) must be within [{}, {}]",
                opt.fixed_impulse, bounds::ISP.0, bounds::ISP.1
            ));
        }
        if opt.max_evaluations == 0 {
            errors.push("optimizer.max_evaluations must be > 0".to_string());
        }
        if !(opt.tolerance > 0.0 && opt.tolerance < 1.0) {
            errors.push(format!(
                "optimizer.tolerance ({}) must be in (0, 1)",
                opt.tolerance
            ));
        }

        if self.jobs.cleanup_interval_secs == 0 {
            errors.push("jobs.cleanup_interval_secs must be > 0".to_string());
        }
        if self.jobs.max_age_hours <= 0 || self.jobs.max_age_hours > defaults::MAX_JOB_AGE_HOURS {
            errors.push(format!(
                "jobs.max_age_hours ({}) must be between 1 and {}",
                self.jobs.max_age_hours,
                defaults::MAX_JOB_AGE_HOURS
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Model cache settings derived from `[model]` and the data directory.
    pub fn cache_settings(&self) -> CacheSettings {
        let cache_dir = self
            .model
            .cache_path
            .clone()
            .unwrap_or_else(|| self.server.data_dir.join("models"));
        CacheSettings {
            seed: self.model.seed,
            samples: self.model.samples,
            test_fraction: self.model.test_fraction,
            cache_dir: Some(cache_dir),
        }
    }

    /// Path of the sled database inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.server.data_dir.join("experiments.db")
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, std::io::Error),
    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, toml::de::Error),
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::ImpulseMode;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:8000");
        assert_eq!(config.workers.count, 2);
        assert_eq!(config.model.seed, 42);
        assert_eq!(config.optimizer.impulse_mode, ImpulseMode::Fixed);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [workers]
            count = 4

            [optimizer]
            impulse_mode = "free"
            "#,
        )
        .unwrap();

        assert_eq!(config.workers.count, 4);
        assert_eq!(config.optimizer.impulse_mode, ImpulseMode::Free);
        assert_eq!(config.optimizer.fixed_impulse, 300.0);
        assert_eq!(config.model.samples, 500);
        assert_eq!(config.jobs.max_age_hours, 24);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = AppConfig::default();
        config.workers.count = 0;
        config.model.test_fraction = 1.5;
        config.optimizer.fixed_impulse = 100.0;
        config.jobs.cleanup_interval_secs = 0;

        match config.validate() {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn test_nan_test_fraction_rejected() {
        let mut config = AppConfig::default();
        config.model.test_fraction = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_age_upper_bound() {
        let mut config = AppConfig::default();
        config.jobs.max_age_hours = defaults::MAX_JOB_AGE_HOURS;
        config.validate().unwrap();

        config.jobs.max_age_hours = 10_000_000_000;
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].starts_with("jobs.max_age_hours"), "{}", errors[0]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(
            config.jobs.max_age(),
            chrono::Duration::hours(defaults::MAX_JOB_AGE_HOURS)
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\naddr = \"127.0.0.1:9000\"\ndata_dir = \"/tmp/rocket\"\n\n[jobs]\nmax_age_hours = 6"
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.server.addr, "127.0.0.1:9000");
        assert_eq!(config.jobs.max_age(), chrono::Duration::hours(6));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/rocket/experiments.db"));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workers]\ncount = 0").unwrap();
        assert!(matches!(
            AppConfig::load_from_file(file.path()),
            Err(ConfigError::Validation(_))
        ));

        let missing = AppConfig::load_from_file(Path::new("/nonexistent/rocket.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(..))));
    }

    #[test]
    fn test_cache_settings_default_to_data_dir() {
        let config = AppConfig::default();
        let settings = config.cache_settings();
        assert_eq!(settings.cache_dir, Some(PathBuf::from("./data/models")));
        assert_eq!(settings.samples, 500);

        let mut custom = AppConfig::default();
        custom.model.cache_path = Some(PathBuf::from("/var/models"));
        assert_eq!(custom.cache_settings().cache_dir, Some(PathBuf::from("/var/models")));
    }
}
