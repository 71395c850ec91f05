//! Port for structured request transcripts.
//!
//! Defines the [`TranscriptLogger`] trait for recording pipeline events
//! (classification, plan, step results, validation, final answer) to a
//! structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures the full
//! request transcript in a machine-readable format (JSONL).

use serde_json::Value;

/// A structured transcript event.
pub struct TranscriptEvent {
    /// Event type identifier (e.g., "classification", "plan", "final_answer").
    pub event_type: &'static str,
    /// Request this event belongs to.
    pub request_id: String,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl TranscriptEvent {
    pub fn new(event_type: &'static str, request_id: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type,
            request_id: request_id.into(),
            payload,
        }
    }
}

/// Port for logging transcript events.
///
/// `log` is synchronous and non-fallible; logging failures never disturb the
/// request being served.
pub trait TranscriptLogger: Send + Sync {
    fn log(&self, event: TranscriptEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoTranscriptLogger;

impl TranscriptLogger for NoTranscriptLogger {
    fn log(&self, _event: TranscriptEvent) {}
}
