//! Error responses for the HTTP API.
//!
//! Every error body has the shape
//! `{ "detail": "...", "code": "...", "errors": [ { "field", "message" } ] }`,
//! with `errors` present only for validation failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::pipeline::PipelineError;
use crate::types::{FieldError, ValidationError};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    const fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Validation(v) => Self::Validation(v),
            PipelineError::NotFound(msg) => Self::NotFound(msg),
            PipelineError::Conflict(msg) => Self::Conflict(msg),
            PipelineError::Store(e) => {
                error!(error = %e, "Storage failure while serving request");
                Self::Internal("Storage error".to_string())
            }
            PipelineError::Queue(e) => {
                error!(error = %e, "Job queue rejected submission");
                Self::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = match self {
            Self::Validation(v) => ErrorBody {
                detail: v.to_string(),
                code,
                errors: v.errors,
            },
            Self::NotFound(detail) | Self::Conflict(detail) | Self::Internal(detail) => ErrorBody {
                detail,
                code,
                errors: Vec::new(),
            },
        };
        (status, axum::Json(body)).into_response()
    }
}
