//! Weighted Fusion Engine
//!
//! Combines the normalized vectors of the modalities that produced a result.
//! Configured weights are renormalized over the available modalities only, so
//! a missing modality never drags the final vector toward zero.
//!
//! Pure and deterministic: identical outcomes and weights give an identical
//! report.

use crate::fusion::weights::FusionWeights;
use crate::policy::{InsufficientModalitiesError, ModalityOutcome};
use crate::types::{Emotion, EmotionScores, Modality};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Tenths in 100%
const TENTHS_TOTAL: i64 = 1000;

/// Final verdict of one fusion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusionReport {
    pub final_emotion: Emotion,
    /// Final score of `final_emotion` as a percentage, one decimal
    pub confidence: f64,
    /// Percentages with one decimal, summing to exactly 100.0
    pub all_scores: EmotionScores,
    /// One slot per attempted modality, in text/video/audio order
    pub per_modality: Vec<ModalityOutcome>,
    /// Renormalized weights actually applied (available modalities only)
    pub effective_weights: BTreeMap<Modality, f64>,
}

impl FusionReport {
    /// Modalities that contributed to the report
    pub fn modalities_used(&self) -> Vec<Modality> {
        self.effective_weights.keys().copied().collect()
    }
}

/// Fuse per-modality outcomes under `weights`
///
/// Outcomes are keyed by modality, so each modality contributes at most once.
///
/// # Errors
/// `InsufficientModalitiesError` when no modality is present, or when every
/// present modality has a configured weight of zero.
pub fn fuse(
    outcomes: &BTreeMap<Modality, ModalityOutcome>,
    weights: &FusionWeights,
) -> Result<FusionReport, InsufficientModalitiesError> {
    debug_assert!(outcomes.iter().all(|(modality, outcome)| *modality == outcome.modality()));
    let per_modality: Vec<ModalityOutcome> = outcomes.values().cloned().collect();

    let failures: Vec<_> = per_modality.iter().filter_map(|o| o.failure().cloned()).collect();
    let available: Vec<_> = per_modality.iter().filter_map(|o| o.result()).collect();

    if available.is_empty() {
        return Err(InsufficientModalitiesError { failures });
    }

    let weight_total: f64 = available.iter().map(|r| weights.get(r.modality())).sum();
    if weight_total <= 0.0 {
        warn!(
            available = available.len(),
            "Every available modality has zero weight, nothing to fuse"
        );
        return Err(InsufficientModalitiesError { failures });
    }

    let mut effective_weights = BTreeMap::new();
    let mut final_scores = EmotionScores::zeros();
    for result in &available {
        let effective = weights.get(result.modality()) / weight_total;
        effective_weights.insert(result.modality(), effective);
        for (emotion, score) in result.scores().iter() {
            final_scores.add(emotion, effective * score);
        }
    }

    let final_emotion = final_scores.argmax();
    let all_scores = percentages_in_tenths(&final_scores, final_emotion);
    let confidence = all_scores.get(final_emotion);

    Ok(FusionReport {
        final_emotion,
        confidence,
        all_scores,
        per_modality,
        effective_weights,
    })
}

/// Largest-remainder rounding of a unit vector to percentages in tenths
///
/// `pinned` gets its nearest tenth; the other entries share what is left,
/// each taking the floor or ceiling tenth of its exact value, so the table
/// sums to exactly 100.0. Extra tenths go first to entries that stay at or
/// below `pinned`, then by largest remainder, then in declaration order.
fn percentages_in_tenths(scores: &EmotionScores, pinned: Emotion) -> EmotionScores {
    let total = scores.total();
    let exact: Vec<f64> = scores
        .iter()
        .map(|(_, v)| v / total * TENTHS_TOTAL as f64)
        .collect();

    let pinned_index = pinned.index();
    let pinned_tenths = exact[pinned_index].round() as i64;

    let mut tenths: Vec<i64> = exact.iter().map(|v| v.floor() as i64).collect();
    tenths[pinned_index] = pinned_tenths;
    let deficit = TENTHS_TOTAL - tenths.iter().sum::<i64>();

    let mut order: Vec<usize> = (0..exact.len())
        .filter(|&i| i != pinned_index && exact[i] > exact[i].floor())
        .collect();
    order.sort_by(|&a, &b| {
        let exceeds = |i: usize| tenths[i] + 1 > pinned_tenths;
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        exceeds(a)
            .cmp(&exceeds(b))
            .then(rb.total_cmp(&ra))
            .then(a.cmp(&b))
    });
    for &i in order.iter().take(deficit.max(0) as usize) {
        tenths[i] += 1;
    }

    Emotion::ALL
        .iter()
        .map(|e| (*e, tenths[e.index()] as f64 / 10.0))
        .collect()
}
