//! Failure/Degradation Policy
//!
//! Two failure classes, kept apart on purpose:
//! - **Per-modality** (analyzer error, unparseable output, missing analyzer,
//!   panicked task): recoverable. The modality becomes an absent slot and the
//!   remaining weights are renormalized.
//! - **Request-level** ([`FatalInputError`] when the shared input cannot be
//!   acquired, [`InsufficientModalitiesError`] when nothing survived):
//!   terminal, surfaced to the caller.

use crate::fusion::normalizer::{normalize, RawModalityOutput, RemainderPolicy};
use crate::fusion::weights::WeightsError;
use crate::types::{Modality, ModalityResult};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Analyzer output could not be coerced into a canonical score vector
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationError {
    #[error("empty analyzer output")]
    Empty,

    #[error("label '{0}' has no canonical emotion")]
    UnmappedLabel(String),

    #[error("invalid score {value} for label '{label}'")]
    InvalidValue { label: String, value: f64 },

    #[error("confidence {0} outside the valid range")]
    ConfidenceOutOfRange(f64),

    #[error("scores sum to zero")]
    ZeroSum,

    #[error("scores sum to {0}, expected 1.0")]
    NotNormalized(f64),
}

/// Shared input could not be acquired; no modality can run
#[derive(Debug, Clone, Error)]
#[error("input acquisition failed: {0}")]
pub struct FatalInputError(pub String);

impl FatalInputError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Why a modality was excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Analyzer returned an error (timeout, model, media, API)
    Analyzer,
    /// Analyzer output was unparseable or empty
    Normalization,
    /// No analyzer configured for this modality
    Unavailable,
    /// Analyzer task panicked
    Panicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Analyzer => "analyzer",
            FailureKind::Normalization => "normalization",
            FailureKind::Unavailable => "unavailable",
            FailureKind::Panicked => "panicked",
        };
        f.write_str(name)
    }
}

/// Recoverable failure of one modality
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{modality} {kind} failure: {message}")]
pub struct ModalityFailure {
    pub modality: Modality,
    pub kind: FailureKind,
    pub message: String,
}

impl ModalityFailure {
    pub fn new(modality: Modality, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            modality,
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(modality: Modality) -> Self {
        Self::new(
            modality,
            FailureKind::Unavailable,
            format!("no {} analyzer configured", modality),
        )
    }
}

/// Every attempted modality failed (or carried no weight)
#[derive(Debug, Clone, Error)]
#[error("no modality produced a usable result ({} failed)", failures.len())]
pub struct InsufficientModalitiesError {
    pub failures: Vec<ModalityFailure>,
}

/// Per-modality slot handed to the fusion engine
///
/// Serializes as `{"status": "ok", "result": {...}}` or
/// `{"status": "failed", "failure": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ModalityOutcome {
    Ok { result: ModalityResult },
    Failed { failure: ModalityFailure },
}

impl ModalityOutcome {
    pub fn modality(&self) -> Modality {
        match self {
            ModalityOutcome::Ok { result } => result.modality(),
            ModalityOutcome::Failed { failure } => failure.modality,
        }
    }

    pub fn result(&self) -> Option<&ModalityResult> {
        match self {
            ModalityOutcome::Ok { result } => Some(result),
            ModalityOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&ModalityFailure> {
        match self {
            ModalityOutcome::Ok { .. } => None,
            ModalityOutcome::Failed { failure } => Some(failure),
        }
    }
}

impl From<ModalityResult> for ModalityOutcome {
    fn from(result: ModalityResult) -> Self {
        ModalityOutcome::Ok { result }
    }
}

impl From<ModalityFailure> for ModalityOutcome {
    fn from(failure: ModalityFailure) -> Self {
        ModalityOutcome::Failed { failure }
    }
}

/// Request-level failure returned by the orchestrator
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    FatalInput(#[from] FatalInputError),

    #[error(transparent)]
    InsufficientModalities(#[from] InsufficientModalitiesError),

    #[error(transparent)]
    InvalidWeights(#[from] WeightsError),
}

/// Convert one analyzer call's outcome into a fusion slot
///
/// Analyzer errors and normalization errors both become absent markers;
/// nothing here is ever propagated as a request failure.
pub fn settle(
    modality: Modality,
    raw: anyhow::Result<RawModalityOutput>,
    remainder: &RemainderPolicy,
) -> ModalityOutcome {
    let raw = match raw {
        Ok(raw) => raw,
        Err(e) => {
            let message = format!("{:#}", e);
            warn!(modality = %modality, error = %message, "Analyzer failed, excluding modality");
            return ModalityFailure::new(modality, FailureKind::Analyzer, message).into();
        }
    };

    match normalize(modality, raw, remainder) {
        Ok(result) => {
            debug!(
                modality = %modality,
                primary = %result.primary(),
                score = result.primary_score(),
                "Modality normalized"
            );
            result.into()
        }
        Err(e) => {
            warn!(modality = %modality, error = %e, "Normalization failed, excluding modality");
            ModalityFailure::new(modality, FailureKind::Normalization, e.to_string()).into()
        }
    }
}
