//! Shared input and the collaborator traits
//!
//! The acquirer produces one [`DecodedInput`] per request; every analyzer
//! reads from the same instance through an `Arc`. The input owns the
//! request's [`ScratchDir`], so temporary media disappears when the last
//! reference is dropped.

use crate::fusion::RawModalityOutput;
use crate::policy::FatalInputError;
use crate::types::Modality;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Caller-supplied reference to the media under analysis (e.g. a video URL)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SourceDescriptor(String);

impl SourceDescriptor {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-request temporary directory, removed on drop
///
/// Removal failures are logged, never raised.
#[derive(Debug)]
pub struct ScratchDir(Option<TempDir>);

impl ScratchDir {
    /// Create a fresh directory under `base` (system temp dir when `None`)
    pub fn create(base: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("emofuse-");
        let dir = match base {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                builder.tempdir_in(base)?
            }
            None => builder.tempdir()?,
        };
        debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(Self(Some(dir)))
    }

    /// No backing directory (text-only requests)
    pub fn none() -> Self {
        Self(None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.0.as_ref().map(|dir| dir.path())
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.0.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!(path = %path.display(), "Removed scratch directory"),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove scratch directory"
                ),
            }
        }
    }
}

/// Decoded media shared read-only by all analyzers
///
/// Any field may be absent when the acquirer could only obtain part of the
/// input; analyzers that need a missing field report an error for their
/// modality.
#[derive(Debug)]
pub struct DecodedInput {
    /// Stable identifier of the source (e.g. the video id)
    pub source_id: String,
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
    pub video_path: Option<PathBuf>,
    /// Mono WAV track
    pub audio_path: Option<PathBuf>,
    /// Flattened subtitles
    pub transcript: Option<String>,
    pub description: Option<String>,
    scratch: ScratchDir,
}

impl DecodedInput {
    pub fn new(source_id: impl Into<String>, scratch: ScratchDir) -> Self {
        Self {
            source_id: source_id.into(),
            title: None,
            duration_seconds: None,
            video_path: None,
            audio_path: None,
            transcript: None,
            description: None,
            scratch,
        }
    }

    /// Ad-hoc text with no media and no scratch directory
    pub fn from_text(text: impl Into<String>) -> Self {
        let mut input = Self::new("text", ScratchDir::none());
        input.transcript = Some(text.into());
        input
    }

    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch.path()
    }

    /// Text for the text modality: transcript, falling back to description
    pub fn text(&self) -> Option<&str> {
        [self.transcript.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// Produces the shared input for one request
///
/// Any error here is fatal for the request; no analyzer runs.
#[async_trait::async_trait]
pub trait InputAcquirer: Send + Sync {
    async fn acquire(&self, source: &SourceDescriptor) -> Result<DecodedInput, FatalInputError>;
}

/// Scores one modality of the shared input
///
/// Implementations own their timeouts. Errors remove only this modality
/// from fusion.
#[async_trait::async_trait]
pub trait ModalityAnalyzer: Send + Sync {
    /// Modality this analyzer fills
    fn modality(&self) -> Modality;

    /// Analyzer name for logs and diagnostics
    fn name(&self) -> &'static str;

    async fn analyze(&self, input: &DecodedInput) -> anyhow::Result<RawModalityOutput>;
}
