//! REST API module using Axum
//!
//! Submit-then-poll interface over the experiment pipeline. Submission never
//! blocks on the computation; clients poll `/status/:job_id` and fetch
//! `/result/:job_id` once the job is terminal.

pub mod error;
pub mod handlers;
mod routes;

pub use error::ApiError;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pipeline::AppState;

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// `origins` lists allowed cross-origin callers, e.g. a local dashboard dev
/// server. Unparseable entries are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return base;
    }

    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.trim().parse().ok()).collect();
    tracing::info!(origins = ?origins, "CORS: allowing configured origins");
    base.allow_origin(allowed)
}

/// Create the complete application router.
pub fn create_app(state: AppState, cors_origins: &[String]) -> Router {
    routes::api_routes(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
}
