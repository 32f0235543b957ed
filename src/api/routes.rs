//! API route definitions

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use crate::pipeline::AppState;

/// Create all experiment routes.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/run", post(handlers::run_experiment))
        .route("/status/:job_id", get(handlers::get_status))
        .route("/result/:job_id", get(handlers::get_result))
        .route("/explain/:job_id", get(handlers::get_explanation))
        .with_state(state)
}
