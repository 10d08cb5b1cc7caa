//! Core Types for EmoFuse
//!
//! The canonical vocabulary every analyzer output is normalized into:
//! - [`Emotion`]: closed eight-label set, declaration order is the tie-break priority
//! - [`Modality`]: the three independent evidence sources
//! - [`EmotionScores`]: fixed-size score vector keyed by [`Emotion`]
//! - [`ModalityResult`]: one modality's normalized vector plus diagnostics

use crate::policy::NormalizationError;
use serde::ser::{Serialize, Serializer};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Tolerance for "scores sum to 1.0"
pub const SCORE_SUM_TOLERANCE: f64 = 1e-6;

// ============================================================================
// Emotion / Modality
// ============================================================================

/// Canonical emotion labels
///
/// Variant order is significant: ties between equal scores resolve to the
/// variant declared first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Fear,
    Disgust,
    Surprise,
    Neutral,
    Calm,
}

impl Emotion {
    /// Number of canonical emotions
    pub const COUNT: usize = 8;

    /// All emotions in declaration (priority) order
    pub const ALL: [Emotion; Emotion::COUNT] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Fear,
        Emotion::Disgust,
        Emotion::Surprise,
        Emotion::Neutral,
        Emotion::Calm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fear => "fear",
            Emotion::Disgust => "disgust",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
            Emotion::Calm => "calm",
        }
    }

    /// Position in [`Emotion::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses canonical names only; native analyzer vocabularies go through
/// [`crate::fusion::synonyms::canonical_emotion`].
impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown emotion: {}", s))
    }
}

/// Independent evidence sources
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Video,
    Audio,
}

impl Modality {
    /// All modalities in reporting order
    pub const ALL: [Modality; 3] = [Modality::Text, Modality::Video, Modality::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Video => "video",
            Modality::Audio => "audio",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Score vector
// ============================================================================

/// Score per canonical emotion
///
/// Serializes as a map `{"happy": 0.9, ...}` in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EmotionScores([f64; Emotion::COUNT]);

impl EmotionScores {
    /// All-zero vector
    pub fn zeros() -> Self {
        Self([0.0; Emotion::COUNT])
    }

    pub fn get(&self, emotion: Emotion) -> f64 {
        self.0[emotion.index()]
    }

    pub fn set(&mut self, emotion: Emotion, value: f64) {
        self.0[emotion.index()] = value;
    }

    pub fn add(&mut self, emotion: Emotion, value: f64) {
        self.0[emotion.index()] += value;
    }

    /// (emotion, score) pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        Emotion::ALL.iter().map(move |e| (*e, self.0[e.index()]))
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Highest-scoring emotion; ties go to the earlier-declared emotion
    pub fn argmax(&self) -> Emotion {
        let mut best = Emotion::ALL[0];
        let mut best_score = self.get(best);
        for emotion in Emotion::ALL.iter().skip(1) {
            let score = self.get(*emotion);
            if score > best_score {
                best = *emotion;
                best_score = score;
            }
        }
        best
    }

    /// Every entry multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        let mut out = *self;
        for value in out.0.iter_mut() {
            *value *= factor;
        }
        out
    }
}

impl FromIterator<(Emotion, f64)> for EmotionScores {
    fn from_iter<I: IntoIterator<Item = (Emotion, f64)>>(iter: I) -> Self {
        let mut scores = EmotionScores::zeros();
        for (emotion, value) in iter {
            scores.add(emotion, value);
        }
        scores
    }
}

impl Serialize for EmotionScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|(e, v)| (e.as_str(), v)))
    }
}

// ============================================================================
// ModalityResult
// ============================================================================

/// Modality-specific diagnostics (frames processed, reasoning text, ...)
///
/// Opaque to fusion; passed through for reporting only.
pub type ModalityMeta = BTreeMap<String, serde_json::Value>;

/// Normalized output of one modality
///
/// Immutable once built: `scores` sum to 1.0 and `primary` is always
/// `scores.argmax()`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ModalityResult {
    modality: Modality,
    primary: Emotion,
    scores: EmotionScores,
    meta: ModalityMeta,
}

impl ModalityResult {
    /// Build from an already-normalized vector
    ///
    /// # Errors
    /// `NormalizationError` if any score is negative/non-finite or the vector
    /// does not sum to 1.0 within [`SCORE_SUM_TOLERANCE`].
    pub fn from_scores(
        modality: Modality,
        scores: EmotionScores,
        meta: ModalityMeta,
    ) -> Result<Self, NormalizationError> {
        for (emotion, value) in scores.iter() {
            if !value.is_finite() || value < 0.0 {
                return Err(NormalizationError::InvalidValue {
                    label: emotion.to_string(),
                    value,
                });
            }
        }

        let total = scores.total();
        if (total - 1.0).abs() > SCORE_SUM_TOLERANCE {
            return Err(NormalizationError::NotNormalized(total));
        }

        Ok(Self {
            modality,
            primary: scores.argmax(),
            scores,
            meta,
        })
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn primary(&self) -> Emotion {
        self.primary
    }

    pub fn scores(&self) -> &EmotionScores {
        &self.scores
    }

    pub fn meta(&self) -> &ModalityMeta {
        &self.meta
    }

    /// Score of the primary emotion (0.0-1.0)
    pub fn primary_score(&self) -> f64 {
        self.scores.get(self.primary)
    }
}
