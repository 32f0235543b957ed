//! API route handlers
//!
//! - `GET /` - Liveness banner
//! - `GET /health` - Queue and store diagnostics
//! - `POST /run` - Submit an experiment
//! - `GET /status/:job_id` - Poll job progress
//! - `GET /result/:job_id` - Fetch the persisted outcome
//! - `GET /explain/:job_id` - Plain-language explanation of a completed run

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use super::error::ApiError;
use crate::engine::Explanation;
use crate::pipeline::{AppState, ResultView, StatusView};
use crate::types::{ExperimentParams, JobStatus};

/// Response for job submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub workers: usize,
    pub tracked_jobs: usize,
    pub experiments: Option<usize>,
    pub store_backend: &'static str,
}

/// GET /
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Rocket Fuel Optimizer API",
        "status": "running",
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        workers: state.queue.worker_count(),
        tracked_jobs: state.queue.len(),
        experiments: state.store.experiment_count().ok(),
        store_backend: state.store.backend_name(),
    })
}

/// POST /run
pub async fn run_experiment(
    State(state): State<AppState>,
    Json(params): Json<ExperimentParams>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let job_id = state.submit(params)?;

    Ok(Json(SubmitResponse {
        job_id,
        status: JobStatus::Queued,
        message: "Experiment queued successfully".to_string(),
    }))
}

/// GET /status/:job_id
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusView>, ApiError> {
    Ok(Json(state.status(&job_id)?))
}

/// GET /result/:job_id
pub async fn get_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ResultView>, ApiError> {
    Ok(Json(state.result(&job_id)?))
}

/// GET /explain/:job_id
pub async fn get_explanation(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Explanation>, ApiError> {
    Ok(Json(state.explain(&job_id)?))
}
