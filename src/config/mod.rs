//! Service Configuration Module
//!
//! All tunables (listen address, worker count, model training, optimizer
//! budget, job retention) come from one TOML file.
//!
//! ## Loading Order
//!
//! 1. `ROCKET_CONFIG` environment variable (path to TOML file)
//! 2. `rocket_config.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! CLI flags are applied on top by the binary, then `validate()` runs once
//! more before anything starts.
//!
//! ```toml
//! [server]
//! addr = "0.0.0.0:8000"
//! data_dir = "./data"
//!
//! [workers]
//! count = 2
//!
//! [optimizer]
//! impulse_mode = "fixed"   # or "free"
//! fixed_impulse = 300.0
//! ```

mod app_config;
pub mod defaults;

pub use app_config::*;
