//! Fusion Orchestrator
//!
//! Entry point for one analysis request:
//! 1. Acquire the shared input once (fatal on failure, no analyzer runs)
//! 2. Run every configured analyzer as its own task in a `JoinSet` over
//!    `Arc<DecodedInput>` (cancelled together with the request)
//! 3. Settle each result into a fusion slot (failures become absent markers)
//! 4. Fuse under the request's weights
//!
//! The scratch directory lives inside the input and is removed once the last
//! task drops its reference, whichever way the request ends.

use crate::fusion::{fuse, FusionReport, FusionWeights, RemainderPolicy};
use crate::policy::{settle, AnalysisError, FailureKind, ModalityFailure, ModalityOutcome};
use crate::types::{Modality, ModalityResult};
use crate::workflow::input::{DecodedInput, InputAcquirer, ModalityAnalyzer, SourceDescriptor};
use chrono::Utc;
use emofuse_common::events::{EmofuseEvent, EventBus};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Describes the analyzed source in the response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    pub source: String,
    pub source_id: String,
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
}

/// Successful analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub analysis_id: Uuid,
    pub source: SourceInfo,
    #[serde(flatten)]
    pub report: FusionReport,
}

/// Drives acquisition, analyzers, normalization and fusion
pub struct FusionOrchestrator {
    acquirer: Arc<dyn InputAcquirer>,
    analyzers: BTreeMap<Modality, Arc<dyn ModalityAnalyzer>>,
    weights: FusionWeights,
    remainder: RemainderPolicy,
    event_bus: Option<EventBus>,
}

impl FusionOrchestrator {
    /// Create an orchestrator with no analyzers registered
    ///
    /// Modalities without an analyzer are reported as `unavailable`.
    pub fn new(acquirer: Arc<dyn InputAcquirer>, weights: FusionWeights, remainder: RemainderPolicy) -> Self {
        Self {
            acquirer,
            analyzers: BTreeMap::new(),
            weights,
            remainder,
            event_bus: None,
        }
    }

    /// Register the analyzer for its modality (replaces any previous one)
    pub fn with_analyzer(mut self, analyzer: Arc<dyn ModalityAnalyzer>) -> Self {
        let modality = analyzer.modality();
        if let Some(previous) = self.analyzers.insert(modality, analyzer) {
            warn!(
                modality = %modality,
                replaced = previous.name(),
                "Replacing previously registered analyzer"
            );
        }
        self
    }

    /// Publish lifecycle events on `event_bus`
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Configured default weights
    pub fn weights(&self) -> &FusionWeights {
        &self.weights
    }

    /// Names of registered analyzers by modality
    pub fn analyzer_names(&self) -> BTreeMap<Modality, &'static str> {
        self.analyzers.iter().map(|(m, a)| (*m, a.name())).collect()
    }

    /// Analyze `source` under `weights` (configured defaults when `None`)
    ///
    /// # Errors
    /// - `FatalInput` when the shared input cannot be acquired
    /// - `InsufficientModalities` when no modality produced a usable result
    pub async fn analyze(
        &self,
        source: &SourceDescriptor,
        weights: Option<FusionWeights>,
    ) -> Result<Analysis, AnalysisError> {
        let weights = weights.unwrap_or(self.weights);
        let analysis_id = Uuid::new_v4();

        info!(analysis_id = %analysis_id, source = %source, "Starting analysis");
        self.emit(EmofuseEvent::AnalysisStarted {
            analysis_id,
            source: source.to_string(),
            timestamp: Utc::now(),
        });

        let input = match self.acquirer.acquire(source).await {
            Ok(input) => Arc::new(input),
            Err(e) => {
                warn!(analysis_id = %analysis_id, error = %e, "Input acquisition failed");
                self.emit(EmofuseEvent::AnalysisFailed {
                    analysis_id,
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(e.into());
            }
        };

        self.emit(EmofuseEvent::InputAcquired {
            analysis_id,
            title: input.title.clone(),
            timestamp: Utc::now(),
        });

        let source_info = SourceInfo {
            source: source.to_string(),
            source_id: input.source_id.clone(),
            title: input.title.clone(),
            duration_seconds: input.duration_seconds,
        };

        let outcomes = self.run_analyzers(analysis_id, &input).await;
        drop(input);

        match fuse(&outcomes, &weights) {
            Ok(report) => {
                info!(
                    analysis_id = %analysis_id,
                    final_emotion = %report.final_emotion,
                    confidence = report.confidence,
                    modalities = report.effective_weights.len(),
                    "Analysis complete"
                );
                self.emit(EmofuseEvent::AnalysisCompleted {
                    analysis_id,
                    final_emotion: report.final_emotion.to_string(),
                    confidence: report.confidence,
                    modalities_used: report
                        .modalities_used()
                        .iter()
                        .map(|m| m.to_string())
                        .collect(),
                    timestamp: Utc::now(),
                });
                Ok(Analysis {
                    analysis_id,
                    source: source_info,
                    report,
                })
            }
            Err(e) => {
                warn!(analysis_id = %analysis_id, failures = e.failures.len(), "No usable modality");
                self.emit(EmofuseEvent::AnalysisFailed {
                    analysis_id,
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e.into())
            }
        }
    }

    /// Run only the text analyzer and normalizer over ad-hoc text
    pub async fn analyze_text(&self, text: &str) -> Result<ModalityResult, ModalityFailure> {
        let analyzer = self
            .analyzers
            .get(&Modality::Text)
            .ok_or_else(|| ModalityFailure::unavailable(Modality::Text))?;

        let input = DecodedInput::from_text(text);
        let raw = analyzer.analyze(&input).await;

        match settle(Modality::Text, raw, &self.remainder) {
            ModalityOutcome::Ok { result } => Ok(result),
            ModalityOutcome::Failed { failure } => Err(failure),
        }
    }

    async fn run_analyzers(
        &self,
        analysis_id: Uuid,
        input: &Arc<DecodedInput>,
    ) -> BTreeMap<Modality, ModalityOutcome> {
        let mut outcomes = BTreeMap::new();
        // Dropping the set (request cancelled) aborts every analyzer still running
        let mut tasks = JoinSet::new();

        for modality in Modality::ALL {
            match self.analyzers.get(&modality) {
                Some(analyzer) => {
                    let analyzer = Arc::clone(analyzer);
                    let input = Arc::clone(input);
                    tasks.spawn(async move {
                        let raw = AssertUnwindSafe(analyzer.analyze(&input)).catch_unwind().await;
                        (modality, raw)
                    });
                }
                None => {
                    outcomes.insert(modality, ModalityFailure::unavailable(modality).into());
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            let (modality, raw) = match joined {
                Ok(finished) => finished,
                Err(e) => {
                    error!(analysis_id = %analysis_id, error = %e, "Analyzer task aborted");
                    continue;
                }
            };

            let outcome = match raw {
                Ok(raw) => settle(modality, raw, &self.remainder),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(
                        analysis_id = %analysis_id,
                        modality = %modality,
                        error = %message,
                        "Analyzer panicked"
                    );
                    ModalityFailure::new(modality, FailureKind::Panicked, message).into()
                }
            };
            outcomes.insert(modality, outcome);
        }

        // Tasks lost to the runtime without reporting back
        for modality in self.analyzers.keys() {
            outcomes.entry(*modality).or_insert_with(|| {
                ModalityFailure::new(*modality, FailureKind::Panicked, "analyzer task aborted").into()
            });
        }

        for outcome in outcomes.values() {
            self.emit_outcome(analysis_id, outcome);
        }

        outcomes
    }

    fn emit_outcome(&self, analysis_id: Uuid, outcome: &ModalityOutcome) {
        let event = match outcome {
            ModalityOutcome::Ok { result } => EmofuseEvent::ModalityCompleted {
                analysis_id,
                modality: result.modality().to_string(),
                primary: result.primary().to_string(),
                score: result.primary_score(),
                timestamp: Utc::now(),
            },
            ModalityOutcome::Failed { failure } => EmofuseEvent::ModalityFailed {
                analysis_id,
                modality: failure.modality.to_string(),
                kind: failure.kind.to_string(),
                message: failure.message.clone(),
                timestamp: Utc::now(),
            },
        };
        self.emit(event);
    }

    fn emit(&self, event: EmofuseEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(event);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("analyzer panicked: {}", detail)
}
