// Fusion Weights - Validated Per-Modality Prior Weighting
//
// Weights are explicit, immutable values passed into every fusion call.
// An override only ever affects the request it was supplied with.

use crate::types::Modality;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allowed deviation of the weight sum from 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Rejected weight configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightsError {
    #[error("{modality} weight {value} must be within [0, 1]")]
    OutOfRange { modality: Modality, value: f64 },

    #[error("weights sum to {0:.3}, expected 1.0 (±{tol})", tol = WEIGHT_SUM_TOLERANCE)]
    BadSum(f64),
}

/// Per-modality fusion weights
///
/// Invariant: each weight in [0, 1] and the three sum to 1.0 within
/// [`WEIGHT_SUM_TOLERANCE`]. Deserialization goes through the same validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights")]
pub struct FusionWeights {
    text: f64,
    video: f64,
    audio: f64,
}

#[derive(Deserialize)]
struct RawWeights {
    text: f64,
    video: f64,
    audio: f64,
}

impl TryFrom<RawWeights> for FusionWeights {
    type Error = WeightsError;

    fn try_from(raw: RawWeights) -> Result<Self, Self::Error> {
        FusionWeights::new(raw.text, raw.video, raw.audio)
    }
}

impl FusionWeights {
    /// Validate and build
    pub fn new(text: f64, video: f64, audio: f64) -> Result<Self, WeightsError> {
        for (modality, value) in [
            (Modality::Text, text),
            (Modality::Video, video),
            (Modality::Audio, audio),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(WeightsError::OutOfRange { modality, value });
            }
        }

        let sum = text + video + audio;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(WeightsError::BadSum(sum));
        }

        Ok(Self { text, video, audio })
    }

    pub fn get(&self, modality: Modality) -> f64 {
        match modality {
            Modality::Text => self.text,
            Modality::Video => self.video,
            Modality::Audio => self.audio,
        }
    }
}

impl Default for FusionWeights {
    /// text=0.30, video=0.40, audio=0.30
    fn default() -> Self {
        Self {
            text: 0.30,
            video: 0.40,
            audio: 0.30,
        }
    }
}
