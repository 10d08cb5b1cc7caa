//! Text modality via the Gemini `generateContent` REST API
//!
//! The model is prompted for a JSON verdict
//! `{"dominant_emotion", "confidence", "reasoning"}`; the first JSON object in
//! the reply is parsed and returned as a single-label fraction output.

use crate::fusion::{ConfidenceScale, RawModalityOutput, RawOutput};
use crate::types::{Emotion, Modality};
use crate::workflow::{DecodedInput, ModalityAnalyzer};
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use emofuse_common::config::TextAnalyzerSection;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Shorter input carries too little signal to classify
pub const MIN_TEXT_CHARS: usize = 10;

/// Input is truncated to this many characters before prompting
pub const MAX_TEXT_CHARS: usize = 2000;

/// Verdict requested from the model
#[derive(Debug, Deserialize)]
struct LlmVerdict {
    dominant_emotion: String,
    confidence: f64,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Gemini-backed [`ModalityAnalyzer`] for the text modality
pub struct GeminiTextAnalyzer {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiTextAnalyzer {
    pub fn new(config: &TextAnalyzerSection, api_key: String) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http_client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("Gemini returned {}: {}", status, detail.trim());
        }

        let parsed: GenerateContentResponse =
            response.json().await.context("Failed to parse Gemini response")?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            bail!("Gemini returned no text");
        }
        Ok(text)
    }
}

#[async_trait]
impl ModalityAnalyzer for GeminiTextAnalyzer {
    fn modality(&self) -> Modality {
        Modality::Text
    }

    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn analyze(&self, input: &DecodedInput) -> anyhow::Result<RawModalityOutput> {
        let text = input.text().ok_or_else(|| anyhow!("no transcript or description available"))?;
        let prompt = build_prompt(text)?;

        let reply = self.generate(&prompt).await?;
        debug!(chars = reply.len(), "Gemini reply received");

        parse_verdict(&reply)
    }
}

/// Build the classification prompt, enforcing the length limits
pub fn build_prompt(text: &str) -> anyhow::Result<String> {
    let text = text.trim();
    let chars = text.chars().count();
    if chars < MIN_TEXT_CHARS {
        bail!("text too short for analysis ({} chars, need {})", chars, MIN_TEXT_CHARS);
    }

    let excerpt: String = text.chars().take(MAX_TEXT_CHARS).collect();
    let labels: Vec<&str> = Emotion::ALL.iter().map(|e| e.as_str()).collect();

    Ok(format!(
        "Analyze the sentiment and emotion of the following text from a video transcript or description.\n\n\
         Text: {excerpt}\n\n\
         Classify the dominant emotion as exactly one of: {labels}.\n\n\
         Respond ONLY with a JSON object in this exact format:\n\
         {{\"dominant_emotion\": \"emotion_name\", \"confidence\": 0.0-1.0, \"reasoning\": \"brief explanation\"}}\n\n\
         Do not include any other text.",
        excerpt = excerpt,
        labels = labels.join(", "),
    ))
}

/// Turn the model reply into a single-label output
pub fn parse_verdict(reply: &str) -> anyhow::Result<RawModalityOutput> {
    let object = extract_json_object(reply).ok_or_else(|| anyhow!("no JSON object in model reply"))?;
    let verdict: LlmVerdict = serde_json::from_str(object).context("Malformed verdict JSON")?;

    let mut output = RawModalityOutput::new(RawOutput::SingleLabel {
        label: verdict.dominant_emotion,
        confidence: verdict.confidence,
        scale: ConfidenceScale::Fraction,
    });
    if let Some(reasoning) = verdict.reasoning {
        output = output.with_meta("reasoning", reasoning);
    }
    Ok(output)
}

/// First balanced `{...}` in `text`, ignoring braces inside string literals
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
