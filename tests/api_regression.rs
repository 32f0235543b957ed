//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! every endpoint using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use rocket_optimizer::api::create_app;
use rocket_optimizer::jobs::JobQueue;
use rocket_optimizer::ml_engine::{CacheSettings, ModelCache};
use rocket_optimizer::optimization::OptimizerSettings;
use rocket_optimizer::pipeline::AppState;
use rocket_optimizer::storage::{
    ExperimentRecord, ExperimentStore, InMemoryStore, ResultRecord, SledStore,
};
use rocket_optimizer::types::{ExperimentParams, FaultCategory, JobFault, JobStatus};

fn create_test_state(store: Arc<dyn ExperimentStore>) -> AppState {
    AppState::new(
        Arc::new(JobQueue::new(2)),
        store,
        Arc::new(ModelCache::new(CacheSettings {
            samples: 150,
            ..CacheSettings::default()
        })),
        OptimizerSettings::default(),
    )
}

fn test_app() -> Router {
    create_app(create_test_state(Arc::new(InMemoryStore::new())), &[])
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn poll_until_terminal(app: &Router, job_id: &str) -> Value {
    for _ in 0..1500 {
        let (status, body) = send(app, Method::GET, &format!("/status/{job_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "completed" || body["status"] == "failed" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

fn valid_request() -> Value {
    json!({
        "O_F_ratio": 3.5,
        "pressure": 5.0,
        "temp": 3000.0,
        "isp": 300.0,
        "alpha": 0.5,
        "max_temp": 4000.0,
        "tune_model": false
    })
}

#[tokio::test]
async fn test_root_banner() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Rocket Fuel Optimizer API");
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn test_health_reports_queue_and_store() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["workers"], 2);
    assert_eq!(body["tracked_jobs"], 0);
    assert_eq!(body["store_backend"], "InMemory");
}

#[tokio::test]
async fn test_out_of_range_request_is_422_with_field_errors() {
    let app = test_app();
    let mut request = valid_request();
    request["O_F_ratio"] = json!(9.0);
    request["alpha"] = json!(1.5);

    let (status, body) = send(&app, Method::POST, "/run", Some(request)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["O_F_ratio", "alpha"]);
}

#[tokio::test]
async fn test_missing_field_is_rejected() {
    let app = test_app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/run",
        Some(json!({ "O_F_ratio": 3.5, "pressure": 5.0 })),
    )
    .await;

    assert!(status.is_client_error(), "got {status}");
}

#[tokio::test]
async fn test_unknown_job_is_404_everywhere() {
    let app = test_app();
    for uri in ["/status/nope", "/result/nope", "/explain/nope"] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "GET {uri}");
        assert_eq!(body["code"], "NOT_FOUND");
    }

    let (_, body) = send(&app, Method::GET, "/status/nope", None).await;
    assert_eq!(body["detail"], "Job not found");
}

#[tokio::test]
async fn test_end_to_end_experiment() {
    let app = test_app();

    let (status, body) = send(&app, Method::POST, "/run", Some(valid_request())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "queued");
    assert_eq!(body["message"], "Experiment queued successfully");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let final_status = poll_until_terminal(&app, &job_id).await;
    assert_eq!(final_status["status"], "completed");
    assert_eq!(final_status["progress"], 1.0);

    let (status, result) = send(&app, Method::GET, &format!("/result/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["job_id"], job_id.as_str());
    assert!(result["results"]["simulation"]["thrust"].as_f64().unwrap() > 0.0);
    assert!(result["results"]["model_metrics"]["r2"].is_number());

    let optimization = &result["results"]["optimization"];
    assert_eq!(optimization["success"], true);
    let optimal_temp = optimization["optimal_params"]["temp"].as_f64().unwrap();
    assert!(optimal_temp <= 4000.0 + 1e-6, "optimal temp {optimal_temp}");
    assert_eq!(optimization["optimal_params"]["isp"], 300.0);

    let (status, explanation) =
        send(&app, Method::GET, &format!("/explain/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(explanation["summary"].as_str().unwrap().contains("thrust"));
    assert_eq!(explanation["suggestions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_explain_endpoint() {
    let store: Arc<dyn ExperimentStore> = Arc::new(InMemoryStore::new());
    let app = create_app(create_test_state(Arc::clone(&store)), &[]);

    let (_, body) = send(&app, Method::POST, "/run", Some(valid_request())).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    poll_until_terminal(&app, &job_id).await;

    let (status, explanation) =
        send(&app, Method::GET, &format!("/explain/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!explanation["beginner_explanation"].as_str().unwrap().is_empty());
    assert!(explanation["physical_reasons"].as_array().unwrap().len() <= 3);
    assert_eq!(explanation["suggestions"].as_array().unwrap().len(), 3);

    // A run that ended in failure has a result row but nothing to explain.
    store
        .create_experiment(&ExperimentRecord::queued(
            "failed-run",
            ExperimentParams::new(3.5, 5.0, 3000.0, 300.0),
        ))
        .unwrap();
    store
        .save_result(&ResultRecord::failure(
            "failed-run",
            &JobFault::new(FaultCategory::Inference, "model returned NaN"),
        ))
        .unwrap();
    store.set_experiment_status("failed-run", JobStatus::Failed).unwrap();

    let (status, body) = send(&app, Method::GET, "/explain/failed-run", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, result) = send(&app, Method::GET, "/result/failed-run", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], "failed");
    assert_eq!(result["error_category"], "inference");
}

#[tokio::test]
async fn test_null_alpha_skips_optimization() {
    let app = test_app();
    let mut request = valid_request();
    request["alpha"] = Value::Null;

    let (_, body) = send(&app, Method::POST, "/run", Some(request)).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    poll_until_terminal(&app, &job_id).await;

    let (_, result) = send(&app, Method::GET, &format!("/result/{job_id}"), None).await;
    assert_eq!(result["status"], "completed");
    assert!(result["results"]["optimization"].is_null());
}

#[tokio::test]
async fn test_results_survive_in_sled_store() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ExperimentStore> = Arc::new(SledStore::open(dir.path()).unwrap());
    let app = create_app(create_test_state(Arc::clone(&store)), &[]);

    let (_, body) = send(&app, Method::POST, "/run", Some(valid_request())).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    poll_until_terminal(&app, &job_id).await;

    // A fresh app over the same store has no queue entry but still answers.
    let restarted = create_app(create_test_state(store), &[]);
    let (status, view) = send(&restarted, Method::GET, &format!("/status/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "completed");

    let (status, result) =
        send(&restarted, Method::GET, &format!("/result/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], "completed");
}
