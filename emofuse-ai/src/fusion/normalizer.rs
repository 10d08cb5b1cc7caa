//! Score Normalizer
//!
//! Coerces each analyzer's native output into a canonical [`EmotionScores`]
//! vector that sums to 1.0. Two raw shapes are accepted:
//!
//! - **SingleLabel**: one label with a scalar confidence (text and audio
//!   adapters). The confidence lands on the label; the unreported mass is
//!   spread over the other seven emotions by the [`RemainderPolicy`].
//! - **Distribution**: native label → count or fraction (video adapter).
//!   Labels collapsing to the same canonical emotion are summed.

use crate::fusion::synonyms::canonical_emotion;
use crate::policy::NormalizationError;
use crate::types::{Emotion, EmotionScores, Modality, ModalityMeta, ModalityResult};
use emofuse_common::config::FusionSection;
use serde::Serialize;

/// Unit of a single-label confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceScale {
    /// 0.0-1.0
    Fraction,
    /// 0-100
    Percent,
}

impl ConfidenceScale {
    fn to_fraction(self, value: f64) -> f64 {
        match self {
            ConfidenceScale::Fraction => value,
            ConfidenceScale::Percent => value / 100.0,
        }
    }
}

/// Native analyzer output before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    SingleLabel {
        label: String,
        confidence: f64,
        scale: ConfidenceScale,
    },
    /// Pairs rather than a map so repeated native labels are preserved
    Distribution { counts: Vec<(String, f64)> },
}

/// Raw output plus pass-through diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct RawModalityOutput {
    pub output: RawOutput,
    pub meta: ModalityMeta,
}

impl RawModalityOutput {
    pub fn new(output: RawOutput) -> Self {
        Self {
            output,
            meta: ModalityMeta::new(),
        }
    }

    /// Attach one diagnostic entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// How a single-label output's remaining mass `1 - c` is distributed
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RemainderPolicy {
    /// `(1 - c) / 7` to every other emotion
    #[default]
    Uniform,
    /// Proportional to a prior over the other seven emotions
    Prior(EmotionScores),
}

impl RemainderPolicy {
    /// Build from the `[fusion]` config section
    ///
    /// # Errors
    /// Unknown policy name, missing prior, or a prior with unknown labels or
    /// negative values.
    pub fn from_config(section: &FusionSection) -> Result<Self, emofuse_common::Error> {
        match section.remainder.trim().to_lowercase().as_str() {
            "uniform" => Ok(RemainderPolicy::Uniform),
            "prior" => {
                let prior = section.prior.as_ref().ok_or_else(|| {
                    emofuse_common::Error::Config(
                        "remainder = \"prior\" requires a [fusion.prior] table".to_string(),
                    )
                })?;

                let mut scores = EmotionScores::zeros();
                for (label, value) in prior {
                    let emotion = canonical_emotion(label).ok_or_else(|| {
                        emofuse_common::Error::Config(format!("unknown emotion in prior: {}", label))
                    })?;
                    if !value.is_finite() || *value < 0.0 {
                        return Err(emofuse_common::Error::Config(format!(
                            "prior weight for {} must be non-negative, got {}",
                            label, value
                        )));
                    }
                    scores.add(emotion, *value);
                }
                Ok(RemainderPolicy::Prior(scores))
            }
            other => Err(emofuse_common::Error::Config(format!(
                "unknown remainder policy '{}' (expected \"uniform\" or \"prior\")",
                other
            ))),
        }
    }

    /// Spread `mass` over every emotion except `reported`
    fn distribute(&self, reported: Emotion, mass: f64, scores: &mut EmotionScores) {
        let others = Emotion::ALL.iter().copied().filter(|e| *e != reported);

        if let RemainderPolicy::Prior(prior) = self {
            let prior_mass: f64 = others.clone().map(|e| prior.get(e)).sum();
            if prior_mass > 0.0 {
                for emotion in others {
                    scores.add(emotion, mass * prior.get(emotion) / prior_mass);
                }
                return;
            }
        }

        let share = mass / (Emotion::COUNT - 1) as f64;
        for emotion in others {
            scores.add(emotion, share);
        }
    }
}

/// Normalize one modality's raw output
///
/// # Errors
/// - `Empty` for an empty distribution
/// - `UnmappedLabel` for a label outside the synonym table
/// - `InvalidValue` / `ConfidenceOutOfRange` for negative, non-finite or
///   out-of-range values
/// - `ZeroSum` when a distribution carries no mass
pub fn normalize(
    modality: Modality,
    raw: RawModalityOutput,
    remainder: &RemainderPolicy,
) -> Result<ModalityResult, NormalizationError> {
    let RawModalityOutput { output, meta } = raw;

    let scores = match output {
        RawOutput::SingleLabel {
            label,
            confidence,
            scale,
        } => single_label_scores(&label, confidence, scale, remainder)?,
        RawOutput::Distribution { counts } => distribution_scores(&counts)?,
    };

    ModalityResult::from_scores(modality, scores, meta)
}

fn single_label_scores(
    label: &str,
    confidence: f64,
    scale: ConfidenceScale,
    remainder: &RemainderPolicy,
) -> Result<EmotionScores, NormalizationError> {
    let emotion =
        canonical_emotion(label).ok_or_else(|| NormalizationError::UnmappedLabel(label.to_string()))?;

    let c = scale.to_fraction(confidence);
    if !c.is_finite() || !(0.0..=1.0).contains(&c) {
        return Err(NormalizationError::ConfidenceOutOfRange(confidence));
    }

    let mut scores = EmotionScores::zeros();
    scores.set(emotion, c);
    remainder.distribute(emotion, 1.0 - c, &mut scores);

    Ok(rescale(scores))
}

fn distribution_scores(counts: &[(String, f64)]) -> Result<EmotionScores, NormalizationError> {
    if counts.is_empty() {
        return Err(NormalizationError::Empty);
    }

    let mut scores = EmotionScores::zeros();
    for (label, value) in counts {
        let emotion =
            canonical_emotion(label).ok_or_else(|| NormalizationError::UnmappedLabel(label.clone()))?;
        if !value.is_finite() || *value < 0.0 {
            return Err(NormalizationError::InvalidValue {
                label: label.clone(),
                value: *value,
            });
        }
        scores.add(emotion, *value);
    }

    let total = scores.total();
    if total <= 0.0 {
        return Err(NormalizationError::ZeroSum);
    }

    Ok(scores.scaled(1.0 / total))
}

/// Divide by the sum so floating-point drift never trips the 1e-6 check
fn rescale(scores: EmotionScores) -> EmotionScores {
    let total = scores.total();
    if total > 0.0 {
        scores.scaled(1.0 / total)
    } else {
        scores
    }
}
