//! Analysis endpoints
//!
//! - `POST /analyze`: full multimodal analysis of a video URL
//! - `POST /analyze-text`: text modality only, for ad-hoc text

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::fusion::{FusionWeights, WeightsError};
use crate::policy::AnalysisError;
use crate::types::ModalityResult;
use crate::workflow::{Analysis, SourceDescriptor};
use crate::AppState;

/// POST /analyze request body
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub youtube_url: String,
    /// Per-request weight override, validated like the configured weights
    #[serde(default)]
    pub weights: Option<WeightsOverride>,
}

/// Unvalidated weights as sent by the client
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WeightsOverride {
    pub text: f64,
    pub video: f64,
    pub audio: f64,
}

impl WeightsOverride {
    pub fn validate(self) -> Result<FusionWeights, WeightsError> {
        FusionWeights::new(self.text, self.video, self.audio)
    }
}

/// POST /analyze-text request body
#[derive(Debug, Deserialize)]
pub struct AnalyzeTextRequest {
    pub text: String,
}

/// POST /analyze
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<Analysis>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let source = SourceDescriptor::new(request.youtube_url);
    if source.is_empty() {
        return Err(ApiError::BadRequest("youtube_url is required".to_string()));
    }

    let weights = request
        .weights
        .map(WeightsOverride::validate)
        .transpose()
        .map_err(AnalysisError::from)?;

    match state.orchestrator.analyze(&source, weights).await {
        Ok(analysis) => Ok(Json(analysis)),
        Err(e) => {
            state.record_error(e.to_string()).await;
            Err(e.into())
        }
    }
}

/// POST /analyze-text
pub async fn analyze_text(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeTextRequest>, JsonRejection>,
) -> ApiResult<Json<ModalityResult>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text is required".to_string()));
    }

    info!(chars = request.text.len(), "Analyzing ad-hoc text");

    match state.orchestrator.analyze_text(&request.text).await {
        Ok(result) => Ok(Json(result)),
        Err(failure) => {
            warn!(error = %failure, "Text analysis failed");
            Err(failure.into())
        }
    }
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/analyze-text", post(analyze_text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parsing() {
        let request: AnalyzeRequest =
            serde_json::from_str(r#"{"youtube_url": "https://youtu.be/dQw4w9WgXcQ"}"#).unwrap();
        assert!(request.weights.is_none());

        let request: AnalyzeRequest = serde_json::from_str(
            r#"{"youtube_url": "u", "weights": {"text": 0.5, "video": 0.2, "audio": 0.3}}"#,
        )
        .unwrap();
        assert!(request.weights.unwrap().validate().is_ok());
    }

    #[test]
    fn test_override_validation() {
        let bad = WeightsOverride {
            text: 0.9,
            video: 0.9,
            audio: 0.9,
        };
        assert!(bad.validate().is_err());
    }
}
