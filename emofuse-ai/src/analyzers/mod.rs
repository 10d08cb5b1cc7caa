//! External collaborator adapters
//!
//! Thin, replaceable implementations of the workflow traits:
//! - [`youtube::YtDlpAcquirer`]: video URL → shared [`crate::workflow::DecodedInput`]
//! - [`gemini_text::GeminiTextAnalyzer`]: text modality via an LLM
//! - [`http_classifier::HttpClassifier`]: video and audio modalities via classifier services

pub mod gemini_text;
pub mod http_classifier;
pub mod youtube;

pub use gemini_text::GeminiTextAnalyzer;
pub use http_classifier::HttpClassifier;
pub use youtube::YtDlpAcquirer;
