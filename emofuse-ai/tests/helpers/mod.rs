//! Shared fakes for the integration tests
//!
//! Stand-ins for the acquirer and analyzers so the orchestrator and HTTP
//! surface can be exercised without yt-dlp, an LLM or classifier services.

#![allow(dead_code)]

use async_trait::async_trait;
use emofuse_ai::fusion::{ConfidenceScale, FusionWeights, RawModalityOutput, RawOutput, RemainderPolicy};
use emofuse_ai::policy::FatalInputError;
use emofuse_ai::types::Modality;
use emofuse_ai::workflow::{
    DecodedInput, FusionOrchestrator, InputAcquirer, ModalityAnalyzer, ScratchDir, SourceDescriptor,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Acquirer writing a real scratch directory under a test-owned base
pub struct FakeAcquirer {
    base: TempDir,
    fail_with: Option<String>,
    calls: AtomicUsize,
    scratch_paths: Mutex<Vec<PathBuf>>,
}

impl FakeAcquirer {
    pub fn ok() -> Self {
        Self {
            base: TempDir::new().unwrap(),
            fail_with: None,
            calls: AtomicUsize::new(0),
            scratch_paths: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::ok()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Scratch directories handed out so far
    pub fn scratch_paths(&self) -> Vec<PathBuf> {
        self.scratch_paths.lock().unwrap().clone()
    }

    /// Entries left under the base directory
    pub fn leftover_entries(&self) -> usize {
        std::fs::read_dir(self.base.path()).unwrap().count()
    }
}

#[async_trait]
impl InputAcquirer for FakeAcquirer {
    async fn acquire(&self, source: &SourceDescriptor) -> Result<DecodedInput, FatalInputError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let scratch = ScratchDir::create(Some(self.base.path())).unwrap();
        let dir = scratch.path().unwrap().to_path_buf();
        self.scratch_paths.lock().unwrap().push(dir.clone());

        if let Some(message) = &self.fail_with {
            return Err(FatalInputError::new(message.clone()));
        }

        let video_path = dir.join("video.mp4");
        let audio_path = dir.join("audio.wav");
        std::fs::write(&video_path, b"video").unwrap();
        std::fs::write(&audio_path, b"audio").unwrap();

        let mut input = DecodedInput::new("dQw4w9WgXcQ", scratch);
        input.title = Some(format!("Title of {}", source));
        input.duration_seconds = Some(212.0);
        input.video_path = Some(video_path);
        input.audio_path = Some(audio_path);
        input.transcript = Some("what a wonderful and joyful day this is".to_string());
        Ok(input)
    }
}

/// Scripted analyzer behavior
#[derive(Clone)]
pub enum Behavior {
    Return(RawOutput),
    Fail(String),
    Panic,
    /// Never finishes on its own
    Hang,
}

pub struct FakeAnalyzer {
    modality: Modality,
    behavior: Behavior,
    calls: AtomicUsize,
    cancelled: AtomicUsize,
}

/// Counts analyzer futures dropped before completing
struct CancelGuard<'a> {
    cancelled: &'a AtomicUsize,
    finished: bool,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl FakeAnalyzer {
    pub fn new(modality: Modality, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            modality,
            behavior,
            calls: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModalityAnalyzer for FakeAnalyzer {
    fn modality(&self) -> Modality {
        self.modality
    }

    fn name(&self) -> &'static str {
        "fake"
    }

    async fn analyze(&self, input: &DecodedInput) -> anyhow::Result<RawModalityOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!input.source_id.is_empty());

        let mut guard = CancelGuard {
            cancelled: &self.cancelled,
            finished: false,
        };
        let outcome = match &self.behavior {
            Behavior::Return(output) => Ok(RawModalityOutput::new(output.clone())),
            Behavior::Fail(message) => Err(anyhow::anyhow!("{}", message)),
            Behavior::Panic => {
                guard.finished = true;
                panic!("classifier crashed")
            }
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(anyhow::anyhow!("woke up"))
            }
        };
        guard.finished = true;
        outcome
    }
}

pub fn single(label: &str, confidence: f64) -> Behavior {
    Behavior::Return(RawOutput::SingleLabel {
        label: label.to_string(),
        confidence,
        scale: ConfidenceScale::Fraction,
    })
}

pub fn distribution(pairs: &[(&str, f64)]) -> Behavior {
    Behavior::Return(RawOutput::Distribution {
        counts: pairs.iter().map(|(l, v)| (l.to_string(), *v)).collect(),
    })
}

/// One fake acquirer plus one fake analyzer per modality
pub struct Scenario {
    pub acquirer: Arc<FakeAcquirer>,
    pub text: Arc<FakeAnalyzer>,
    pub video: Arc<FakeAnalyzer>,
    pub audio: Arc<FakeAnalyzer>,
}

impl Scenario {
    pub fn new(acquirer: FakeAcquirer, text: Behavior, video: Behavior, audio: Behavior) -> Self {
        Self {
            acquirer: Arc::new(acquirer),
            text: FakeAnalyzer::new(Modality::Text, text),
            video: FakeAnalyzer::new(Modality::Video, video),
            audio: FakeAnalyzer::new(Modality::Audio, audio),
        }
    }

    /// text happy 0.90, video {happy 0.60, neutral 0.40}, audio failing
    pub fn worked_example() -> Self {
        Self::new(
            FakeAcquirer::ok(),
            single("happy", 0.90),
            distribution(&[("Happy", 0.60), ("Neutral", 0.40)]),
            Behavior::Fail("audio model failed to load".to_string()),
        )
    }

    pub fn orchestrator(&self) -> FusionOrchestrator {
        FusionOrchestrator::new(
            self.acquirer.clone(),
            FusionWeights::default(),
            RemainderPolicy::Uniform,
        )
        .with_analyzer(self.text.clone())
        .with_analyzer(self.video.clone())
        .with_analyzer(self.audio.clone())
    }

    pub fn analyzer_calls(&self) -> usize {
        self.text.calls() + self.video.calls() + self.audio.calls()
    }
}
