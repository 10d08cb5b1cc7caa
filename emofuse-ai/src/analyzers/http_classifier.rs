//! Video/audio modality via an external classifier service
//!
//! The classifier receives `{"path": "<media file>"}` and answers with either
//! a per-frame distribution:
//!
//! ```json
//! {"emotion_distribution": {"Happy": 30, "Neutral": 20}, "total_frames_processed": 50}
//! ```
//!
//! or a single dominant label:
//!
//! ```json
//! {"dominant_emotion": "calm", "confidence_scores": {"calm": 64.0, "sad": 12.0}}
//! {"dominant_emotion": "calm", "confidence": 0.64}
//! ```
//!
//! `confidence_scores` are percentages; `confidence` is a fraction.

use crate::fusion::{canonical_emotion, ConfidenceScale, RawModalityOutput, RawOutput};
use crate::types::Modality;
use crate::workflow::{DecodedInput, ModalityAnalyzer};
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use emofuse_common::config::ClassifierSection;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Classifier service reply
#[derive(Debug, Default, Deserialize)]
pub struct ClassifierResponse {
    #[serde(default)]
    pub emotion_distribution: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub total_frames_processed: Option<u64>,
    #[serde(default)]
    pub dominant_emotion: Option<String>,
    #[serde(default)]
    pub confidence_scores: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ClassifierResponse {
    /// Interpret the reply as a raw modality output
    pub fn into_raw(self) -> anyhow::Result<RawModalityOutput> {
        if let Some(error) = self.error {
            bail!("classifier error: {}", error);
        }

        if let Some(distribution) = self.emotion_distribution.filter(|d| !d.is_empty()) {
            let mut output = RawModalityOutput::new(RawOutput::Distribution {
                counts: distribution.into_iter().collect(),
            });
            if let Some(frames) = self.total_frames_processed {
                output = output.with_meta("frames_processed", frames);
            }
            return Ok(output);
        }

        let label = self
            .dominant_emotion
            .ok_or_else(|| anyhow!("response has neither emotion_distribution nor dominant_emotion"))?;

        // Keys may use a different spelling than the dominant label ("Fear" vs "fearful")
        let target = canonical_emotion(&label);
        let from_scores = self.confidence_scores.as_ref().and_then(|scores| {
            scores
                .iter()
                .find(|(key, _)| key.as_str() == label || (target.is_some() && canonical_emotion(key) == target))
                .map(|(_, value)| *value)
        });

        let (confidence, scale) = match (from_scores, self.confidence) {
            (Some(percent), _) => (percent, ConfidenceScale::Percent),
            (None, Some(fraction)) => (fraction, ConfidenceScale::Fraction),
            (None, None) => bail!("no confidence reported for '{}'", label),
        };

        let mut output = RawModalityOutput::new(RawOutput::SingleLabel {
            label,
            confidence,
            scale,
        });
        if let Some(scores) = self.confidence_scores {
            output = output.with_meta("native_scores", json!(scores));
        }
        Ok(output)
    }
}

/// HTTP client for one classifier service, bound to one modality
pub struct HttpClassifier {
    modality: Modality,
    name: &'static str,
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    /// # Errors
    /// Text is not a media modality and is rejected.
    pub fn new(modality: Modality, config: &ClassifierSection) -> anyhow::Result<Self> {
        let name = match modality {
            Modality::Video => "video-classifier",
            Modality::Audio => "audio-classifier",
            Modality::Text => bail!("HTTP classifier handles video and audio only"),
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            modality,
            name,
            http_client,
            endpoint: config.endpoint.clone(),
        })
    }

    fn media_path<'a>(&self, input: &'a DecodedInput) -> Option<&'a Path> {
        match self.modality {
            Modality::Video => input.video_path.as_deref(),
            Modality::Audio => input.audio_path.as_deref(),
            Modality::Text => None,
        }
    }
}

#[async_trait]
impl ModalityAnalyzer for HttpClassifier {
    fn modality(&self) -> Modality {
        self.modality
    }

    fn name(&self) -> &'static str {
        self.name
    }

    async fn analyze(&self, input: &DecodedInput) -> anyhow::Result<RawModalityOutput> {
        let path = self
            .media_path(input)
            .ok_or_else(|| anyhow!("no {} track in the acquired input", self.modality))?;

        debug!(modality = %self.modality, path = %path.display(), "Requesting classification");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&json!({ "path": path }))
            .send()
            .await
            .with_context(|| format!("{} request failed", self.name))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("{} returned {}: {}", self.name, status, detail.trim());
        }

        let reply: ClassifierResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", self.name))?;

        reply.into_raw()
    }
}
