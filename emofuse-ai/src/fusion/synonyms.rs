// Native Label → Canonical Emotion Mapping
//
// Analyzers speak their own vocabularies ("Fearful", "surprised", "Disgust").
// Every accepted spelling is listed here explicitly; anything else is rejected
// so that an unexpected label fails loudly instead of being dropped.

use crate::types::Emotion;

/// Maps an analyzer-native label to its canonical emotion
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// * `None` if the label is not in the table
pub fn canonical_emotion(label: &str) -> Option<Emotion> {
    let label_lower = label.trim().to_lowercase();

    match label_lower.as_str() {
        "happy" | "happiness" | "joy" => Some(Emotion::Happy),
        "sad" | "sadness" => Some(Emotion::Sad),
        "angry" | "anger" => Some(Emotion::Angry),
        "fear" | "fearful" => Some(Emotion::Fear),
        "disgust" | "disgusted" => Some(Emotion::Disgust),
        "surprise" | "surprised" => Some(Emotion::Surprise),
        "neutral" => Some(Emotion::Neutral),
        "calm" => Some(Emotion::Calm),
        _ => None,
    }
}
