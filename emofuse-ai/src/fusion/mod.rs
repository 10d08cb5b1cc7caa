//! Fusion core
//!
//! Normalizer (raw analyzer output → canonical vector), synonym table,
//! validated weights, and the weighted fusion engine.

pub mod engine;
pub mod normalizer;
pub mod synonyms;
pub mod weights;

pub use engine::{fuse, FusionReport};
pub use normalizer::{normalize, ConfidenceScale, RawModalityOutput, RawOutput, RemainderPolicy};
pub use synonyms::canonical_emotion;
pub use weights::{FusionWeights, WeightsError};
