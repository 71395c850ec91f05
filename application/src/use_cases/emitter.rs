//! Ordered lifecycle events for one request.

use crate::ports::transcript_logger::{TranscriptEvent, TranscriptLogger};
use ragline_domain::PipelineEvent;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Append-only event sink for a single request.
///
/// Events are forwarded in the order they are emitted. The first terminal
/// event (`final_answer` or `error`) closes the stream; anything emitted
/// after it is dropped. When the receiving side has gone away the request's
/// cancellation token is triggered so downstream work stops at its next
/// yield point.
pub struct EventEmitter {
    sender: Option<mpsc::Sender<PipelineEvent>>,
    cancel: CancellationToken,
    transcript: Arc<dyn TranscriptLogger>,
    request_id: String,
    session_id: Option<String>,
    terminated: bool,
}

impl EventEmitter {
    pub fn channel(
        sender: mpsc::Sender<PipelineEvent>,
        cancel: CancellationToken,
        transcript: Arc<dyn TranscriptLogger>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            sender: Some(sender),
            ..Self::silent(cancel, transcript, request_id)
        }
    }

    /// Emitter that only writes the transcript (synchronous mode).
    pub fn silent(
        cancel: CancellationToken,
        transcript: Arc<dyn TranscriptLogger>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            sender: None,
            cancel,
            transcript,
            request_id: request_id.into(),
            session_id: None,
            terminated: false,
        }
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub async fn emit(&mut self, event: PipelineEvent) {
        if self.terminated {
            debug!("Dropping {} event emitted after the terminal event", event.event_type);
            return;
        }
        self.terminated = event.is_terminal();

        self.transcript.log(TranscriptEvent::new(
            event.event_type.as_str(),
            &self.request_id,
            json!({
                "session_id": self.session_id,
                "content": event.content,
                "data": event.data,
            }),
        ));

        let disconnected = match &self.sender {
            Some(sender) => sender.send(event).await.is_err(),
            None => false,
        };
        if disconnected {
            debug!("Event receiver for {} dropped; cancelling", self.request_id);
            self.sender = None;
            self.cancel.cancel();
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::transcript_logger::NoTranscriptLogger;
    use ragline_domain::{EventType, FinalAnswer};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<&'static str>>);

    impl TranscriptLogger for Recording {
        fn log(&self, event: TranscriptEvent) {
            self.0.lock().unwrap().push(event.event_type);
        }
    }

    #[tokio::test]
    async fn test_only_one_terminal_event() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut emitter =
            EventEmitter::channel(tx, CancellationToken::new(), Arc::new(NoTranscriptLogger), "r1");
        emitter.emit(PipelineEvent::thought("working")).await;
        emitter.emit(PipelineEvent::final_answer(&FinalAnswer::new("done", 0.9))).await;
        emitter.emit(PipelineEvent::error("late failure")).await;
        emitter.emit(PipelineEvent::thought("late thought")).await;
        drop(emitter);

        let mut types = Vec::new();
        while let Some(event) = rx.recv().await {
            types.push(event.event_type);
        }
        assert_eq!(types, vec![EventType::Thought, EventType::FinalAnswer]);
    }

    #[tokio::test]
    async fn test_dropped_receiver_cancels_request() {
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let mut emitter =
            EventEmitter::channel(tx, cancel.clone(), Arc::new(NoTranscriptLogger), "r1");
        drop(rx);
        emitter.emit(PipelineEvent::thought("anyone there?")).await;
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_silent_emitter_still_writes_transcript() {
        let transcript = Arc::new(Recording::default());
        let mut emitter = EventEmitter::silent(CancellationToken::new(), transcript.clone(), "r1");
        emitter.emit(PipelineEvent::action("plan")).await;
        emitter.emit(PipelineEvent::error("boom")).await;
        assert!(emitter.is_terminated());
        assert_eq!(*transcript.0.lock().unwrap(), vec!["action", "error"]);
    }
}
