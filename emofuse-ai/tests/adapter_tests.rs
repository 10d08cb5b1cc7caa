//! Adapter integration tests against local stub services
//!
//! A throwaway axum server on 127.0.0.1 stands in for the Gemini REST API
//! and the classifier services.

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use emofuse_ai::analyzers::{GeminiTextAnalyzer, HttpClassifier};
use emofuse_ai::fusion::{normalize, RawOutput, RemainderPolicy};
use emofuse_ai::types::{Emotion, Modality};
use emofuse_ai::workflow::{DecodedInput, ModalityAnalyzer, ScratchDir};
use emofuse_common::config::{ClassifierSection, TextAnalyzerSection};
use serde_json::{json, Value};

/// Serve `app` on an ephemeral port, returning its base URL
async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    })
}

fn text_config(endpoint: String) -> TextAnalyzerSection {
    TextAnalyzerSection {
        endpoint,
        timeout_seconds: 5,
        ..TextAnalyzerSection::default()
    }
}

#[tokio::test]
async fn test_gemini_analyzer_parses_fenced_verdict() {
    let app = Router::new().route(
        "/v1beta/models/:model",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(headers["x-goog-api-key"], "test-key");
            let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default();
            assert!(prompt.contains("a truly miserable rainy afternoon"));
            Json(gemini_reply(
                "```json\n{\"dominant_emotion\": \"sad\", \"confidence\": 0.82, \"reasoning\": \"gloomy\"}\n```",
            ))
        }),
    );
    let base = spawn_stub(app).await;

    let analyzer = GeminiTextAnalyzer::new(&text_config(base), "test-key".to_string()).unwrap();
    let input = DecodedInput::from_text("a truly miserable rainy afternoon");

    let raw = analyzer.analyze(&input).await.unwrap();
    assert_eq!(raw.meta["reasoning"], "gloomy");

    let result = normalize(Modality::Text, raw, &RemainderPolicy::Uniform).unwrap();
    assert_eq!(result.primary(), Emotion::Sad);
    assert!((result.primary_score() - 0.82).abs() < 1e-9);
}

#[tokio::test]
async fn test_gemini_analyzer_surfaces_api_errors() {
    let app = Router::new().route(
        "/v1beta/models/:model",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, "quota exhausted") }),
    );
    let base = spawn_stub(app).await;

    let analyzer = GeminiTextAnalyzer::new(&text_config(base), "test-key".to_string()).unwrap();
    let err = analyzer
        .analyze(&DecodedInput::from_text("long enough text for the model"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("429"));
}

#[tokio::test]
async fn test_gemini_analyzer_rejects_short_text_without_calling_api() {
    // Unroutable endpoint: any request would fail with a connection error
    let analyzer =
        GeminiTextAnalyzer::new(&text_config("http://127.0.0.1:1".to_string()), "k".to_string()).unwrap();

    let err = analyzer.analyze(&DecodedInput::from_text("hi")).await.unwrap_err();
    assert!(err.to_string().contains("too short"));
}

#[tokio::test]
async fn test_video_classifier_distribution() {
    let app = Router::new().route(
        "/classify",
        post(|Json(body): Json<Value>| async move {
            assert!(body["path"].as_str().unwrap().ends_with("video.mp4"));
            Json(json!({
                "emotion_distribution": { "Happy": 30, "Neutral": 20 },
                "total_frames_processed": 50
            }))
        }),
    );
    let base = spawn_stub(app).await;

    let config = ClassifierSection {
        endpoint: format!("{}/classify", base),
        timeout_seconds: 5,
    };
    let classifier = HttpClassifier::new(Modality::Video, &config).unwrap();

    let scratch = ScratchDir::create(None).unwrap();
    let video_path = scratch.path().unwrap().join("video.mp4");
    let mut input = DecodedInput::new("abc", scratch);
    input.video_path = Some(video_path);

    let raw = classifier.analyze(&input).await.unwrap();
    assert!(matches!(raw.output, RawOutput::Distribution { .. }));

    let result = normalize(Modality::Video, raw, &RemainderPolicy::Uniform).unwrap();
    assert_eq!(result.primary(), Emotion::Happy);
    assert!((result.scores().get(Emotion::Neutral) - 0.4).abs() < 1e-9);
    assert_eq!(result.meta()["frames_processed"], 50);
}

#[tokio::test]
async fn test_audio_classifier_missing_track_fails() {
    let config = ClassifierSection {
        endpoint: "http://127.0.0.1:1/classify".to_string(),
        timeout_seconds: 5,
    };
    let classifier = HttpClassifier::new(Modality::Audio, &config).unwrap();

    let input = DecodedInput::new("abc", ScratchDir::none());
    let err = classifier.analyze(&input).await.unwrap_err();
    assert!(err.to_string().contains("no audio track"));
}

#[tokio::test]
async fn test_audio_classifier_percent_scores() {
    let app = Router::new().route(
        "/classify",
        post(|| async {
            Json(json!({
                "dominant_emotion": "calm",
                "confidence_scores": { "calm": 64.0, "sad": 20.0, "neutral": 16.0 }
            }))
        }),
    );
    let base = spawn_stub(app).await;

    let config = ClassifierSection {
        endpoint: format!("{}/classify", base),
        timeout_seconds: 5,
    };
    let classifier = HttpClassifier::new(Modality::Audio, &config).unwrap();

    let mut input = DecodedInput::new("abc", ScratchDir::none());
    input.audio_path = Some("/tmp/audio.wav".into());

    let raw = classifier.analyze(&input).await.unwrap();
    let result = normalize(Modality::Audio, raw, &RemainderPolicy::Uniform).unwrap();
    assert_eq!(result.primary(), Emotion::Calm);
    assert!((result.primary_score() - 0.64).abs() < 1e-9);
}
