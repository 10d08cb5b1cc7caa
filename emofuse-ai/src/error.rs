//! Error types for the HTTP surface
//!
//! Every handler error renders as `{"error": {"code", "message"}}`.

use crate::policy::{AnalysisError, InsufficientModalitiesError, ModalityFailure};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Shared input could not be acquired (502)
    #[error("Input unavailable: {0}")]
    InputUnavailable(String),

    /// No modality produced a usable result (422)
    #[error("{0}")]
    InsufficientModalities(InsufficientModalitiesError),

    /// Single-modality diagnostic failed (422)
    #[error("{0}")]
    ModalityFailed(ModalityFailure),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InputUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::InsufficientModalities(_) | ApiError::ModalityFailed(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::InputUnavailable(_) => "INPUT_UNAVAILABLE",
            ApiError::InsufficientModalities(_) => "INSUFFICIENT_MODALITIES",
            ApiError::ModalityFailed(_) => "MODALITY_FAILED",
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::FatalInput(e) => ApiError::InputUnavailable(e.0),
            AnalysisError::InsufficientModalities(e) => ApiError::InsufficientModalities(e),
            AnalysisError::InvalidWeights(e) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<ModalityFailure> for ApiError {
    fn from(failure: ModalityFailure) -> Self {
        ApiError::ModalityFailed(failure)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
        });

        // Per-modality reasons travel with the terminal error
        match &self {
            ApiError::InsufficientModalities(e) => error["failures"] = json!(e.failures),
            ApiError::ModalityFailed(f) => error["failures"] = json!([f]),
            _ => {}
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
