//! Analysis lifecycle events and EventBus
//!
//! Events are broadcast via EventBus and serialized for SSE transmission.
//! Emotions and modalities travel as their lowercase names so this crate stays
//! independent of the fusion types.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// EmoFuse event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EmofuseEvent {
    /// Analysis request accepted
    AnalysisStarted {
        analysis_id: Uuid,
        /// Source descriptor as supplied by the caller
        source: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Shared input acquired (downloaded/decoded)
    InputAcquired {
        analysis_id: Uuid,
        title: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One modality produced a normalized result
    ModalityCompleted {
        analysis_id: Uuid,
        modality: String,
        primary: String,
        /// Score of the primary emotion (0.0-1.0)
        score: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One modality failed and was excluded from fusion
    ModalityFailed {
        analysis_id: Uuid,
        modality: String,
        /// Failure class (analyzer, normalization, unavailable, panicked)
        kind: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Fusion produced a report
    AnalysisCompleted {
        analysis_id: Uuid,
        final_emotion: String,
        /// Confidence (0-100)
        confidence: f64,
        /// Modalities that contributed to the report
        modalities_used: Vec<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Request-level failure (fatal input or every modality failed)
    AnalysisFailed {
        analysis_id: Uuid,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl EmofuseEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            EmofuseEvent::AnalysisStarted { .. } => "AnalysisStarted",
            EmofuseEvent::InputAcquired { .. } => "InputAcquired",
            EmofuseEvent::ModalityCompleted { .. } => "ModalityCompleted",
            EmofuseEvent::ModalityFailed { .. } => "ModalityFailed",
            EmofuseEvent::AnalysisCompleted { .. } => "AnalysisCompleted",
            EmofuseEvent::AnalysisFailed { .. } => "AnalysisFailed",
        }
    }

    /// Analysis this event belongs to
    pub fn analysis_id(&self) -> Uuid {
        match self {
            EmofuseEvent::AnalysisStarted { analysis_id, .. }
            | EmofuseEvent::InputAcquired { analysis_id, .. }
            | EmofuseEvent::ModalityCompleted { analysis_id, .. }
            | EmofuseEvent::ModalityFailed { analysis_id, .. }
            | EmofuseEvent::AnalysisCompleted { analysis_id, .. }
            | EmofuseEvent::AnalysisFailed { analysis_id, .. } => *analysis_id,
        }
    }
}

/// Broadcast bus for EmofuseEvent
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EmofuseEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before lagging receivers drop old events
    ///
    /// # Examples
    ///
    /// ```
    /// use emofuse_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<EmofuseEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: EmofuseEvent,
    ) -> Result<usize, broadcast::error::SendError<EmofuseEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: EmofuseEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
