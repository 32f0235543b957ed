//! Experiment persistence
//!
//! Experiments and their results are stored behind the `ExperimentStore`
//! trait. The server uses the sled backend; tests and the offline `run`
//! command use the in-memory one.

pub mod persistence;
pub mod sled_store;

pub use persistence::{ExperimentRecord, ExperimentStore, InMemoryStore, ResultRecord, StoreError};
pub use sled_store::SledStore;
